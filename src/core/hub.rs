//! The hub: binding table, proxy dispatch, and result reconciliation.
//!
//! One hub per process, constructed at startup and passed by reference to
//! every call site (no singletons). Call sites invoke landed procedures
//! through `Hub::call` instead of calling them directly; the host binding
//! is read at call time, so re-landing re-targets the next call without
//! touching the captured descriptors or their dependency closure.

use super::context::{capture, Context};
use super::error::Error;
use super::executor;
use super::payload;
use super::registry::Registry;
use super::resolver;
use super::types::{Host, RemoteExecutionResult, SlotKind, Value};
use crate::lang::Dialect;
use crate::transport::Transport;
use indexmap::IndexMap;
use std::sync::Mutex;
use tracing::{debug, info};

/// Binding-table entry for a landed procedure.
#[derive(Debug, Clone)]
struct Landing {
    host: Host,
    /// Dependency closure resolved at first landing; never recomputed.
    closure: Vec<String>,
}

/// The migration engine.
pub struct Hub {
    dialect: Dialect,
    transport: Box<dyn Transport>,
    registry: Mutex<Registry>,
    landings: Mutex<IndexMap<String, Landing>>,
}

impl Hub {
    pub fn new(dialect: Dialect, transport: Box<dyn Transport>) -> Self {
        Self {
            dialect,
            transport,
            registry: Mutex::new(Registry::new()),
            landings: Mutex::new(IndexMap::new()),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Land a procedure on a host.
    ///
    /// The first landing for a name captures its descriptor and resolves
    /// the dependency closure; every later landing updates only the host
    /// mapping (last write wins).
    pub fn land(&self, name: &str, host: &Host, ctx: &Context) -> Result<(), Error> {
        {
            let mut landings = self.landings.lock().expect("landings lock poisoned");
            if let Some(landing) = landings.get_mut(name) {
                info!(procedure = name, host = %host.addr, "re-landed");
                landing.host = host.clone();
                return Ok(());
            }
        }

        let closure = {
            let mut registry = self.registry.lock().expect("registry lock poisoned");
            resolver::resolve(&mut registry, ctx, self.dialect, name)?
        };
        info!(procedure = name, host = %host.addr, closure_len = closure.len(), "landed");

        let mut landings = self.landings.lock().expect("landings lock poisoned");
        landings.insert(
            name.to_string(),
            Landing {
                host: host.clone(),
                closure,
            },
        );
        Ok(())
    }

    /// Detach a procedure: remove its binding entirely. Distinct from
    /// re-landing on localhost, which keeps remote semantics over the
    /// local transport. Returns whether the name was landed.
    pub fn unland(&self, name: &str) -> bool {
        let mut landings = self.landings.lock().expect("landings lock poisoned");
        landings.shift_remove(name).is_some()
    }

    pub fn is_landed(&self, name: &str) -> bool {
        self.landings
            .lock()
            .expect("landings lock poisoned")
            .contains_key(name)
    }

    /// Current host binding for a landed name.
    pub fn host_of(&self, name: &str) -> Option<Host> {
        self.landings
            .lock()
            .expect("landings lock poisoned")
            .get(name)
            .map(|l| l.host.clone())
    }

    /// Invoke a landed procedure: snapshot → payload → remote execution →
    /// reconcile. Blocks for the full round trip; state mutations are
    /// visible in `ctx` and side-effect output has been replayed before
    /// this returns.
    pub fn call(&self, name: &str, args: &[Value], ctx: &mut Context) -> Result<Value, Error> {
        let (host, closure) = {
            let landings = self.landings.lock().expect("landings lock poisoned");
            let landing = landings
                .get(name)
                .ok_or_else(|| Error::NotFound(name.to_string()))?;
            (landing.host.clone(), landing.closure.clone())
        };

        let snapshot = capture(ctx);

        let definitions = {
            let registry = self.registry.lock().expect("registry lock poisoned");
            closure
                .iter()
                .filter_map(|dep| registry.get(dep).ok())
                .map(|d| d.source_text.clone())
                .collect::<Vec<_>>()
        };

        let payload = payload::build(self.dialect, name, args, &snapshot, &definitions)?;
        debug!(procedure = name, host = %host.addr, slots = snapshot.len(), "dispatching");

        let result = executor::execute(self.transport.as_ref(), &host, &payload)?;
        Ok(self.reconcile(ctx, result))
    }

    /// Land and immediately invoke — the one-shot convenience entry point.
    pub fn run(
        &self,
        name: &str,
        host: &Host,
        args: &[Value],
        ctx: &mut Context,
    ) -> Result<Value, Error> {
        self.land(name, host, ctx)?;
        self.call(name, args, ctx)
    }

    /// Fold a remote result back into the caller's environment: overwrite
    /// caller-scoped slots, replay captured output, hand back the return
    /// value.
    fn reconcile(&self, ctx: &mut Context, result: RemoteExecutionResult) -> Value {
        for (name, wire) in result.updated_state.iter() {
            if SlotKind::classify(name) == SlotKind::Instance {
                ctx.set(name.clone(), Value::from_wire(wire));
            }
        }
        if !result.captured_output.is_empty() {
            println!("{}", result.captured_output);
        }
        result.return_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{TransportError, TransportErrorKind};
    use crate::transport::{ExecOutput, SystemTransport};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Transport double: records every (addr, payload) pair and plays back
    /// scripted responses.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        responses: Arc<Mutex<VecDeque<Result<ExecOutput, TransportError>>>>,
    }

    impl ScriptedTransport {
        fn push_record(&self, record: &str) {
            self.responses.lock().unwrap().push_back(Ok(ExecOutput {
                exit_code: 0,
                stdout: format!("{}\n", record),
                stderr: String::new(),
            }));
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, host: &Host, payload: &str) -> Result<ExecOutput, TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push((host.addr.clone(), payload.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(TransportError::new(
                        TransportErrorKind::Io,
                        "no scripted response",
                    ))
                })
        }
    }

    fn host(name: &str, addr: &str) -> Host {
        Host {
            name: name.to_string(),
            addr: addr.to_string(),
            user: "root".to_string(),
            ssh_key: None,
        }
    }

    #[test]
    fn test_land_unknown_procedure_fails() {
        let hub = Hub::new(Dialect::Ruby, Box::new(ScriptedTransport::default()));
        let err = hub
            .land("ghost", &Host::localhost(), &Context::new())
            .unwrap_err();
        assert_eq!(err, Error::NotFound("ghost".to_string()));
        assert!(!hub.is_landed("ghost"));
    }

    #[test]
    fn test_land_then_call_returns_value() {
        let transport = ScriptedTransport::default();
        transport.push_record(r#"{"variables":{},"output":"","result":42}"#);
        let hub = Hub::new(Dialect::Ruby, Box::new(transport.clone()));

        let mut ctx = Context::new();
        ctx.define_procedure("pure", "def pure(a)\n  a + 1\nend");
        hub.land("pure", &Host::localhost(), &ctx).unwrap();

        let value = hub.call("pure", &[Value::Int(41)], &mut ctx).unwrap();
        assert_eq!(value, Value::Int(42));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("def pure"));
        assert!(sent[0].1.contains("pure(41)"));
    }

    #[test]
    fn test_call_reconciles_caller_scoped_slots_only() {
        let transport = ScriptedTransport::default();
        transport.push_record(
            r#"{"variables":{"@y":15,"$prefix":"CHANGED","@new":7},"output":"","result":null}"#,
        );
        let hub = Hub::new(Dialect::Ruby, Box::new(transport));

        let mut ctx = Context::new();
        ctx.set("@y", Value::Int(3));
        ctx.set("@untouched", Value::Str("same".to_string()));
        ctx.set("$prefix", Value::Str("LOG".to_string()));
        ctx.define_procedure("mutate", "def mutate\n  @y = @y * 5\nend");

        hub.run("mutate", &Host::localhost(), &[], &mut ctx).unwrap();

        assert_eq!(ctx.get("@y"), Some(&Value::Int(15)));
        assert_eq!(ctx.get("@new"), Some(&Value::Int(7)));
        // non-@ slots are never written back
        assert_eq!(ctx.get("$prefix"), Some(&Value::Str("LOG".to_string())));
        assert_eq!(ctx.get("@untouched"), Some(&Value::Str("same".to_string())));
    }

    #[test]
    fn test_reland_updates_host_without_reresolving() {
        let transport = ScriptedTransport::default();
        transport.push_record(r#"{"variables":{},"output":"","result":null}"#);
        let hub = Hub::new(Dialect::Ruby, Box::new(transport.clone()));

        let mut ctx1 = Context::new();
        ctx1.define_procedure("job", "def job\n  helper\nend");
        ctx1.define_procedure("helper", "def helper\n  1\nend");
        hub.land("job", &host("a", "10.0.0.1"), &ctx1).unwrap();

        // a context with a conflicting helper definition; if re-landing
        // re-resolved, this source would replace the captured one
        let mut ctx2 = Context::new();
        ctx2.define_procedure("job", "def job\n  2\nend");
        ctx2.define_procedure("helper", "def helper\n  999\nend");
        hub.land("job", &host("b", "10.0.0.2"), &ctx2).unwrap();

        assert_eq!(hub.host_of("job").unwrap().addr, "10.0.0.2");

        hub.call("job", &[], &mut ctx2).unwrap();
        let sent = transport.sent();
        assert_eq!(sent[0].0, "10.0.0.2", "binding read at call time");
        assert!(sent[0].1.contains("helper\nend"));
        assert!(!sent[0].1.contains("999"), "closure was not recomputed");
    }

    #[test]
    fn test_binding_read_at_call_time() {
        let transport = ScriptedTransport::default();
        transport.push_record(r#"{"variables":{},"output":"","result":1}"#);
        transport.push_record(r#"{"variables":{},"output":"","result":2}"#);
        let hub = Hub::new(Dialect::Ruby, Box::new(transport.clone()));

        let mut ctx = Context::new();
        ctx.define_procedure("f", "def f\n  0\nend");
        hub.land("f", &host("a", "10.0.0.1"), &ctx).unwrap();
        hub.call("f", &[], &mut ctx).unwrap();

        hub.land("f", &host("b", "10.0.0.2"), &ctx).unwrap();
        hub.call("f", &[], &mut ctx).unwrap();

        let addrs: Vec<String> = transport.sent().iter().map(|(a, _)| a.clone()).collect();
        assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_unland_detaches() {
        let transport = ScriptedTransport::default();
        let hub = Hub::new(Dialect::Ruby, Box::new(transport));
        let mut ctx = Context::new();
        ctx.define_procedure("f", "def f\n  0\nend");
        hub.land("f", &Host::localhost(), &ctx).unwrap();

        assert!(hub.unland("f"));
        assert!(!hub.is_landed("f"));
        assert!(!hub.unland("f"));

        let err = hub.call("f", &[], &mut ctx).unwrap_err();
        assert_eq!(err, Error::NotFound("f".to_string()));

        // landing again is allowed (descriptor is still captured)
        hub.land("f", &Host::localhost(), &ctx).unwrap();
        assert!(hub.is_landed("f"));
    }

    #[test]
    fn test_call_skips_opaque_slot_ships_rest() {
        let transport = ScriptedTransport::default();
        transport.push_record(r#"{"variables":{"@y":3},"output":"","result":null}"#);
        let hub = Hub::new(Dialect::Ruby, Box::new(transport.clone()));

        let mut ctx = Context::new();
        ctx.set("@fh", Value::Opaque("open file".to_string()));
        ctx.set("@y", Value::Int(3));
        ctx.define_procedure("f", "def f\n  @y\nend");

        hub.run("f", &Host::localhost(), &[], &mut ctx).unwrap();
        let payload = &transport.sent()[0].1;
        assert!(payload.contains("@y = 3"));
        assert!(!payload.contains("@fh"));
    }

    #[test]
    fn test_call_transport_error_propagates_untouched() {
        let transport = ScriptedTransport::default();
        transport.responses.lock().unwrap().push_back(Err(
            TransportError::new(TransportErrorKind::Refused, "connection refused"),
        ));
        let hub = Hub::new(Dialect::Ruby, Box::new(transport));

        let mut ctx = Context::new();
        ctx.set("@y", Value::Int(3));
        ctx.define_procedure("f", "def f\n  @y\nend");
        hub.land("f", &Host::localhost(), &ctx).unwrap();

        let err = hub.call("f", &[], &mut ctx).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        // failed call leaves local state untouched
        assert_eq!(ctx.get("@y"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_call_malformed_response_is_protocol_error() {
        let transport = ScriptedTransport::default();
        transport.responses.lock().unwrap().push_back(Ok(ExecOutput {
            exit_code: 0,
            stdout: "{\"variables\":{},\"outp".to_string(),
            stderr: String::new(),
        }));
        let hub = Hub::new(Dialect::Ruby, Box::new(transport));

        let mut ctx = Context::new();
        ctx.define_procedure("f", "def f\n  0\nend");
        hub.land("f", &Host::localhost(), &ctx).unwrap();

        assert!(matches!(
            hub.call("f", &[], &mut ctx),
            Err(Error::Protocol(_))
        ));
    }

    // ------------------------------------------------------------------
    // End-to-end through a real local interpreter (skipped when absent).
    // ------------------------------------------------------------------

    fn python_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn ruby_available() -> bool {
        std::process::Command::new("ruby")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_e2e_python_state_roundtrip() {
        if !python_available() {
            return;
        }
        let hub = Hub::new(
            Dialect::Python,
            Box::new(SystemTransport::new(Dialect::Python)),
        );

        let mut ctx = Context::new();
        ctx.set("@y", Value::Int(3));
        ctx.define_procedure("dep", "def dep():\n    global y\n    y = y * 5");
        ctx.define_procedure(
            "hello",
            "def hello(arg):\n    dep()\n    return \"It's %d\" % (y * arg)",
        );

        let value = hub
            .run("hello", &Host::localhost(), &[Value::Int(5)], &mut ctx)
            .unwrap();

        // same computation with a local y starting at 3: (3*5)*5
        assert_eq!(value, Value::Str("It's 75".to_string()));
        assert_eq!(ctx.get("@y"), Some(&Value::Int(15)));
    }

    #[test]
    fn test_e2e_python_pure_functional_equivalence() {
        if !python_available() {
            return;
        }
        let hub = Hub::new(
            Dialect::Python,
            Box::new(SystemTransport::new(Dialect::Python)),
        );

        let mut ctx = Context::new();
        ctx.define_procedure("double", "def double(n):\n    return n + n");
        let value = hub
            .run("double", &Host::localhost(), &[Value::Int(21)], &mut ctx)
            .unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn test_e2e_python_remote_fault_reaches_record() {
        if !python_available() {
            return;
        }
        let hub = Hub::new(
            Dialect::Python,
            Box::new(SystemTransport::new(Dialect::Python)),
        );
        let mut ctx = Context::new();
        ctx.set("@y", Value::Int(1));
        ctx.define_procedure("boom", "def boom():\n    raise ValueError(\"nope\")");

        // the remote failure is folded into output; the call still returns
        let value = hub
            .run("boom", &Host::localhost(), &[], &mut ctx)
            .unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(ctx.get("@y"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_e2e_ruby_state_roundtrip() {
        if !ruby_available() {
            return;
        }
        let hub = Hub::new(Dialect::Ruby, Box::new(SystemTransport::new(Dialect::Ruby)));

        let mut ctx = Context::new();
        ctx.set("@y", Value::Int(3));
        ctx.define_procedure("dep", "def dep\n  @y = @y * 5\nend");
        ctx.define_procedure(
            "hello",
            "def hello(arg)\n  dep\n  \"It's \" + (@y * arg).to_s\nend",
        );

        let value = hub
            .run("hello", &Host::localhost(), &[Value::Int(5)], &mut ctx)
            .unwrap();
        assert_eq!(value, Value::Str("It's 75".to_string()));
        assert_eq!(ctx.get("@y"), Some(&Value::Int(15)));
    }

    #[test]
    fn test_e2e_ruby_script_error_still_emits_record() {
        if !ruby_available() {
            return;
        }
        let hub = Hub::new(Dialect::Ruby, Box::new(SystemTransport::new(Dialect::Ruby)));

        let mut ctx = Context::new();
        ctx.set("@y", Value::Int(1));
        ctx.define_procedure(
            "boom",
            "def boom\n  raise NotImplementedError, \"nope\"\nend",
        );

        // NotImplementedError is not a StandardError; the fault is folded
        // into output and the record still comes back
        let value = hub.run("boom", &Host::localhost(), &[], &mut ctx).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(ctx.get("@y"), Some(&Value::Int(1)));
    }
}
