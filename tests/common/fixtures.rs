//! Standard test fixtures with realistic MIB data.

use async_agentx::{Oid, Value, oid};
use std::collections::BTreeMap;

/// Enterprise OID the test subagent identifies itself with.
pub fn test_enterprise() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999)
}

/// system group (1.3.6.1.2.1.1).
pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

/// Standard system MIB entries (1.3.6.1.2.1.1).
///
/// Returns OIDs for sysDescr.0, sysObjectID.0, sysUpTime.0, sysContact.0,
/// sysName.0, sysLocation.0.
pub fn system_mib() -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();

    data.insert(sys_descr(), Value::from("Test AgentX Subagent"));
    data.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 2, 0),
        Value::ObjectIdentifier(test_enterprise()),
    );
    data.insert(sys_uptime(), Value::TimeTicks(123456));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 4, 0), Value::from("admin@test.local"));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("test-agent"));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("Test Lab"));

    data
}
