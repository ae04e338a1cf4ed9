//! Shared source/target dashboards for engine tests

use serde_json::json;

use crate::migration::types::MigrationRequest;
use crate::services::client::fake::FakeDashboard;
use crate::services::gateway::{NetworkRef, OrgRef};

pub const SOURCE_ORG: &str = "100";
pub const TARGET_ORG: &str = "200";
pub const SOURCE_NET: &str = "N_SRC";
pub const TARGET_NET: &str = "N_TGT";
pub const CORE: &str = "Q2SW-0000-0001";
pub const EDGE: &str = "Q2SW-0000-0002";
pub const AP: &str = "Q2AP-0000-0003";

pub fn source_org() -> OrgRef {
    OrgRef {
        id: SOURCE_ORG.into(),
        name: "Source Org".into(),
    }
}

pub fn target_org() -> OrgRef {
    OrgRef {
        id: TARGET_ORG.into(),
        name: "Target Org".into(),
    }
}

pub fn source_network() -> NetworkRef {
    NetworkRef {
        id: SOURCE_NET.into(),
        name: "Branch".into(),
    }
}

pub fn request() -> MigrationRequest {
    MigrationRequest {
        source_org: source_org(),
        source_network: source_network(),
        target_org: target_org(),
        target_network_name: None,
    }
}

pub fn net(path: &str) -> String {
    format!("/networks/{}{}", SOURCE_NET, path)
}

pub fn target_net(path: &str) -> String {
    format!("/networks/{}{}", TARGET_NET, path)
}

pub fn dev(serial: &str, path: &str) -> String {
    format!("/devices/{}{}", serial, path)
}

/// Two switches and an access point; two access policies shared by three
/// ports, five QoS rules, one routing interface with DHCP
pub fn source_dashboard() -> FakeDashboard {
    let api = FakeDashboard::new();
    api.set(
        &format!("/organizations/{}", SOURCE_ORG),
        json!({"id": SOURCE_ORG, "name": "Source Org"}),
    );
    api.set(
        &format!("/networks/{}", SOURCE_NET),
        json!({
            "id": SOURCE_NET,
            "organizationId": SOURCE_ORG,
            "name": "Branch",
            "productTypes": ["switch", "wireless"],
            "timeZone": "Europe/Berlin",
            "tags": ["site-7"]
        }),
    );
    api.set(
        &net("/devices"),
        json!([
            {"serial": CORE, "name": "core", "model": "MS250-48", "networkId": SOURCE_NET},
            {"serial": EDGE, "name": "edge", "model": "MS120-8", "networkId": SOURCE_NET},
            {"serial": AP, "name": "lobby", "model": "MR46", "networkId": SOURCE_NET}
        ]),
    );
    for serial in [CORE, EDGE, AP] {
        api.set(
            &format!("/devices/{}", serial),
            json!({"serial": serial, "networkId": SOURCE_NET}),
        );
        api.set(
            &format!("/organizations/{}/inventory/devices/{}", SOURCE_ORG, serial),
            json!({"serial": serial, "networkId": SOURCE_NET}),
        );
        api.set(
            &dev(serial, "/managementInterface"),
            json!({
                "wan1": {"usingStaticIp": false, "vlan": 1},
                "ddnsHostnames": {"activeDdnsHostname": "x.dynamic-m.com"}
            }),
        );
    }

    api.set(
        &net("/switch/accessPolicies"),
        json!([
            {
                "accessPolicyNumber": 1,
                "name": "Dot1x",
                "radiusServers": [{"host": "10.0.0.5", "port": 1812}],
                "radiusAccountingServers": [{"host": "10.0.0.5", "port": 1813}]
            },
            {
                "accessPolicyNumber": 2,
                "name": "MAB",
                "radiusServers": [{"host": "10.0.0.6", "port": 1812, "secret": "hunter2"}]
            }
        ]),
    );
    api.set(
        &net("/switch/portSchedules"),
        json!([{"id": "ps-1", "name": "Business hours", "portSchedule": {"monday": {"active": true}}}]),
    );
    api.set(
        &net("/switch/qosRules"),
        json!([
            {"id": "q1", "vlan": 10, "dscp": 46},
            {"id": "q2", "vlan": 20, "dscp": 34},
            {"id": "q3", "vlan": 30, "dscp": 26},
            {"id": "q4", "vlan": 40, "dscp": 18},
            {"id": "q5", "vlan": 50, "dscp": 10}
        ]),
    );
    api.set(
        &net("/switch/qosRules/order"),
        json!({"ruleIds": ["q1", "q2", "q3", "q4", "q5"]}),
    );
    api.set(
        &net("/switch/linkAggregations"),
        json!([{"id": "la-1", "switchPorts": [
            {"serial": CORE, "portId": "47"},
            {"serial": CORE, "portId": "48"}
        ]}]),
    );
    api.set(&net("/switch/stp"), json!({"rstpEnabled": true}));
    api.set(&net("/snmp"), json!({"access": "none"}));
    api.set(
        &net("/switch/routing/multicast/rendezvousPoints"),
        json!([{"rendezvousPointId": "rp-1", "interfaceIp": "10.1.0.1", "multicastGroup": "Any"}]),
    );

    api.set(
        &dev(CORE, "/switch/ports"),
        json!([
            {"portId": "1", "type": "access", "accessPolicyType": "Single-Host",
             "accessPolicyNumber": 1, "portScheduleId": "ps-1", "status": "Connected", "lldp": {}},
            {"portId": "2", "type": "access", "accessPolicyType": "Single-Host",
             "accessPolicyNumber": 1, "portScheduleId": null},
            {"portId": "3", "type": "trunk", "speed": "1 Gbps"}
        ]),
    );
    api.set(
        &dev(CORE, "/switch/routing/interfaces"),
        json!([{"interfaceId": "if-10", "name": "Data", "vlanId": 10,
                "interfaceIp": "10.1.0.1", "subnet": "10.1.0.0/24"}]),
    );
    api.set(
        &dev(CORE, "/switch/routing/interfaces/if-10/dhcp"),
        json!({"dhcpMode": "dhcpServer", "dhcpLeaseTime": "1 day"}),
    );
    api.set(
        &dev(CORE, "/switch/routing/staticRoutes"),
        json!([{"staticRouteId": "sr-1", "subnet": "0.0.0.0/0", "nextHopIp": "10.1.0.254"}]),
    );
    api.set(
        &dev(EDGE, "/switch/ports"),
        json!([{"portId": "1", "type": "access", "accessPolicyType": "Single-Host",
                "accessPolicyNumber": 2}]),
    );
    api
}

/// Target organization with an empty network `N_TGT`; created ids follow the
/// real id field names
pub fn target_dashboard() -> FakeDashboard {
    let api = FakeDashboard::new();
    api.set(
        &format!("/organizations/{}", TARGET_ORG),
        json!({"id": TARGET_ORG, "name": "Target Org"}),
    );
    api.set(&format!("/organizations/{}/networks", TARGET_ORG), json!([]));
    api.set(&target_net("/devices"), json!([]));
    api.id_field(&target_net("/switch/accessPolicies"), "accessPolicyNumber", true);
    for serial in [CORE, EDGE, AP] {
        api.id_field(&dev(serial, "/switch/routing/interfaces"), "interfaceId", false);
        api.id_field(&dev(serial, "/switch/routing/staticRoutes"), "staticRouteId", false);
    }
    api.id_field(
        &target_net("/switch/routing/multicast/rendezvousPoints"),
        "rendezvousPointId",
        false,
    );
    api
}

/// Target organization already holding the default-named target network
pub fn target_dashboard_with_network() -> FakeDashboard {
    let api = target_dashboard();
    api.set(
        &format!("/organizations/{}/networks", TARGET_ORG),
        json!([{"id": TARGET_NET, "organizationId": TARGET_ORG, "name": "Branch_migrated",
                "productTypes": ["switch", "wireless"], "timeZone": "Europe/Berlin"}]),
    );
    api.set(&format!("/networks/{}", TARGET_NET), json!({"id": TARGET_NET, "name": "Branch_migrated"}));
    api
}
