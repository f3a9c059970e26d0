//! BTreeMap-backed Handler for testing.
//!
//! Stores OID->Value mappings with correct lexicographic ordering
//! for GETNEXT operations.

use async_agentx::pdu::SearchRange;
use async_agentx::{
    GetNextResult, GetResult, Handler, Oid, RequestContext, SetResult, Value, VarBind,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// A simple Handler backed by an in-memory BTreeMap.
///
/// Clones share the map, so a test can keep one clone to inspect writes
/// after the other has been moved into a session. TestSet accepts any
/// OID already present; CommitSet writes through.
#[derive(Clone, Default)]
pub struct TestHandler {
    data: Arc<Mutex<BTreeMap<Oid, Value>>>,
}

impl TestHandler {
    /// Create a new handler with initial data.
    pub fn new(initial: BTreeMap<Oid, Value>) -> Self {
        Self {
            data: Arc::new(Mutex::new(initial)),
        }
    }

    /// Current value of `oid` (cloned).
    pub fn value(&self, oid: &Oid) -> Option<Value> {
        self.data.lock().unwrap().get(oid).cloned()
    }
}

impl Handler for TestHandler {
    fn get(&mut self, _ctx: &RequestContext, oid: &Oid) -> GetResult {
        match self.data.lock().unwrap().get(oid) {
            Some(v) => GetResult::Value(v.clone()),
            None => GetResult::NoSuchInstance,
        }
    }

    fn get_next(&mut self, _ctx: &RequestContext, range: &SearchRange) -> GetNextResult {
        let data = self.data.lock().unwrap();
        data.range(range.start.clone()..)
            .find(|(oid, _)| range.contains(oid))
            .map(|(oid, value)| GetNextResult::Value(VarBind::new(oid.clone(), value.clone())))
            .unwrap_or(GetNextResult::EndOfMibView)
    }

    fn test_set(&mut self, _ctx: &RequestContext, varbind: &VarBind) -> SetResult {
        if self.data.lock().unwrap().contains_key(&varbind.oid) {
            SetResult::Ok
        } else {
            SetResult::Err(async_agentx::ErrorStatus::NotWritable)
        }
    }

    fn commit_set(&mut self, _ctx: &RequestContext, varbinds: &[VarBind]) -> SetResult {
        let mut data = self.data.lock().unwrap();
        for vb in varbinds {
            data.insert(vb.oid.clone(), vb.value.clone());
        }
        SetResult::Ok
    }
}
