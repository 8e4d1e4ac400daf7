//! Interface proxy (§4.7): synthesizes a host single-interface implementation
//! that delegates to a script function.

use crate::host::HostTypeHandle;
use crate::namespace::ContextId;
use crate::value::Value;

/// Stable, host-managed identifier for a live proxy. The host side holds the
/// actual synthesized interface implementation; this crate only tracks which
/// script callable and environment it forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyId(u32);

impl ProxyId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Dispatch shape the proxy forwards calls with (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardingShape {
    /// Single abstract method: every call forwards `(args...)` directly.
    SingleMethod,
    /// Multiple abstract methods: calls forward `(method_name, args...)` so
    /// the script callable can dispatch on which method was invoked.
    MultiMethod,
}

/// A synthesized host proxy for one interface, backed by one script callable.
#[derive(Debug, Clone)]
pub struct InterfaceProxy {
    pub id: ProxyId,
    pub interface: HostTypeHandle,
    pub callable: Value,
    /// Environment captured at wrap time (§4.7 "The proxy captures the
    /// environment at wrap time").
    pub captured_context: ContextId,
    pub shape: ForwardingShape,
}

/// Registry of live proxies, owned by the running [`crate::script::Script`].
/// Proxies are allocated here (not in [`crate::heap::Heap`]) because their
/// identity must survive round-trips through the host, which only ever sees
/// the numeric [`ProxyId`].
#[derive(Debug, Default)]
pub struct ProxyTable {
    proxies: Vec<InterfaceProxy>,
}

impl ProxyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        interface: HostTypeHandle,
        callable: Value,
        captured_context: ContextId,
        abstract_methods: &[String],
    ) -> ProxyId {
        let id = ProxyId::new(self.proxies.len().try_into().expect("proxy table exhausted"));
        let shape = if abstract_methods.len() <= 1 { ForwardingShape::SingleMethod } else { ForwardingShape::MultiMethod };
        self.proxies.push(InterfaceProxy { id, interface, callable, captured_context, shape });
        id
    }

    #[must_use]
    pub fn get(&self, id: ProxyId) -> Option<&InterfaceProxy> {
        self.proxies.get(id.raw() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Numeric;
    use crate::value::Value;

    #[test]
    fn single_method_interface_forwards_directly() {
        let mut table = ProxyTable::new();
        let iface = HostTypeHandle { runtime_name: "java.lang.Runnable".into(), pretty_name: "Runnable".into() };
        let id = table.create(iface, Value::Num(Numeric::Int(1)), crate::namespace::Contexts::global_id(), &["run".into()]);
        assert_eq!(table.get(id).unwrap().shape, ForwardingShape::SingleMethod);
    }
}
