//! Configuration snapshot model
//!
//! Every backed-up resource is a [`ResourceRecord`]: a category, the id it
//! had in the source network, the references it holds to other resources,
//! and its raw payload. [`ResourceCategory::descriptor`] is the static table
//! that tells backup where to read a category, restore how to recreate it,
//! and both which payload fields hold cross-resource ids.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::client::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceCategory {
    AccessPolicy,
    PortSchedule,
    QosRule,
    LinkAggregation,
    Stp,
    Mtu,
    SwitchSettings,
    StormControl,
    DhcpServerPolicy,
    DscpToCos,
    AlternateManagementInterface,
    AccessControlLists,
    Ospf,
    Multicast,
    Snmp,
    Syslog,
    Netflow,
    AlertSettings,
    QosRuleOrder,
    ManagementInterface,
    PortConfig,
    WarmSpare,
    RoutingInterface,
    StaticRoute,
    RendezvousPoint,
    InterfaceDhcp,
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Whether a category lives under `/networks/{id}` or `/devices/{serial}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Network,
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One object, read with GET and written with PUT at the same path
    Singleton,
    /// A list read with GET; each element is created with POST and gets a
    /// fresh id in the target
    Collection { id_field: &'static str },
    /// A list of fixed slots (switch ports); each element is written with
    /// PUT at `path/{key}` and keeps its key
    Keyed { key_field: &'static str },
    /// One object per resource of `parent`; `{parent}` in the path is the
    /// parent's id
    PerParent { parent: ResourceCategory },
}

/// Where a payload stores the id of another resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefRule {
    /// Single id at a JSON pointer; absent, null or empty means no reference
    Field {
        pointer: &'static str,
        target: ResourceCategory,
    },
    /// Array of ids at a JSON pointer
    Each {
        pointer: &'static str,
        target: ResourceCategory,
    },
}

impl RefRule {
    pub fn target(&self) -> ResourceCategory {
        match self {
            RefRule::Field { target, .. } | RefRule::Each { target, .. } => *target,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryDescriptor {
    pub category: ResourceCategory,
    pub scope: Scope,
    pub path: &'static str,
    pub shape: Shape,
    /// Restore tier; a category only references categories of lower tiers
    pub tier: u8,
    /// Device categories only present on switch models
    pub switch_only: bool,
    /// Server-generated fields dropped before writing
    pub read_only: &'static [&'static str],
    pub references: &'static [RefRule],
    /// Arrays of RADIUS servers whose `secret` is replaced on restore
    pub secret_lists: &'static [&'static str],
}

const NO_REFS: &[RefRule] = &[];
const NO_FIELDS: &[&str] = &[];
const RADIUS_LISTS: &[&str] = &["/radiusServers", "/radiusAccountingServers"];

const PORT_REFS: &[RefRule] = &[
    RefRule::Field {
        pointer: "/accessPolicyNumber",
        target: ResourceCategory::AccessPolicy,
    },
    RefRule::Field {
        pointer: "/portScheduleId",
        target: ResourceCategory::PortSchedule,
    },
];

const QOS_ORDER_REFS: &[RefRule] = &[RefRule::Each {
    pointer: "/ruleIds",
    target: ResourceCategory::QosRule,
}];

const PORT_READ_ONLY: &[&str] = &[
    "warnings",
    "errors",
    "status",
    "speed",
    "duplex",
    "usageInKbps",
    "cdp",
    "lldp",
    "clientCount",
    "powerUsageInWh",
    "linkNegotiationCapabilities",
    "module",
];

impl ResourceCategory {
    /// Every category, in restore order
    pub const ALL: [ResourceCategory; 26] = [
        ResourceCategory::AccessPolicy,
        ResourceCategory::PortSchedule,
        ResourceCategory::QosRule,
        ResourceCategory::LinkAggregation,
        ResourceCategory::Stp,
        ResourceCategory::Mtu,
        ResourceCategory::SwitchSettings,
        ResourceCategory::StormControl,
        ResourceCategory::DhcpServerPolicy,
        ResourceCategory::DscpToCos,
        ResourceCategory::AlternateManagementInterface,
        ResourceCategory::AccessControlLists,
        ResourceCategory::Ospf,
        ResourceCategory::Multicast,
        ResourceCategory::Snmp,
        ResourceCategory::Syslog,
        ResourceCategory::Netflow,
        ResourceCategory::AlertSettings,
        ResourceCategory::QosRuleOrder,
        ResourceCategory::ManagementInterface,
        ResourceCategory::PortConfig,
        ResourceCategory::WarmSpare,
        ResourceCategory::RoutingInterface,
        ResourceCategory::StaticRoute,
        ResourceCategory::RendezvousPoint,
        ResourceCategory::InterfaceDhcp,
    ];

    pub fn descriptor(self) -> CategoryDescriptor {
        use ResourceCategory::*;

        let network = |path: &'static str, shape: Shape, tier: u8| CategoryDescriptor {
            category: self,
            scope: Scope::Network,
            path,
            shape,
            tier,
            switch_only: false,
            read_only: NO_FIELDS,
            references: NO_REFS,
            secret_lists: NO_FIELDS,
        };
        let device = |path: &'static str, shape: Shape, tier: u8| CategoryDescriptor {
            category: self,
            scope: Scope::Device,
            path,
            shape,
            tier,
            switch_only: true,
            read_only: NO_FIELDS,
            references: NO_REFS,
            secret_lists: NO_FIELDS,
        };

        match self {
            AccessPolicy => CategoryDescriptor {
                secret_lists: RADIUS_LISTS,
                read_only: &["counts"],
                ..network(
                    "/switch/accessPolicies",
                    Shape::Collection {
                        id_field: "accessPolicyNumber",
                    },
                    1,
                )
            },
            PortSchedule => network(
                "/switch/portSchedules",
                Shape::Collection { id_field: "id" },
                1,
            ),
            QosRule => network("/switch/qosRules", Shape::Collection { id_field: "id" }, 1),
            LinkAggregation => network(
                "/switch/linkAggregations",
                Shape::Collection { id_field: "id" },
                1,
            ),
            Stp => network("/switch/stp", Shape::Singleton, 2),
            Mtu => network("/switch/mtu", Shape::Singleton, 2),
            SwitchSettings => network("/switch/settings", Shape::Singleton, 2),
            StormControl => network("/switch/stormControl", Shape::Singleton, 2),
            DhcpServerPolicy => network("/switch/dhcpServerPolicy", Shape::Singleton, 2),
            DscpToCos => network("/switch/dscpToCosMappings", Shape::Singleton, 2),
            AlternateManagementInterface => {
                network("/switch/alternateManagementInterface", Shape::Singleton, 2)
            }
            AccessControlLists => network("/switch/accessControlLists", Shape::Singleton, 2),
            Ospf => network("/switch/routing/ospf", Shape::Singleton, 2),
            Multicast => network("/switch/routing/multicast", Shape::Singleton, 2),
            Snmp => network("/snmp", Shape::Singleton, 2),
            Syslog => network("/syslogServers", Shape::Singleton, 2),
            Netflow => network("/netflow", Shape::Singleton, 2),
            AlertSettings => network("/alerts/settings", Shape::Singleton, 2),
            QosRuleOrder => CategoryDescriptor {
                references: QOS_ORDER_REFS,
                ..network("/switch/qosRules/order", Shape::Singleton, 2)
            },
            ManagementInterface => CategoryDescriptor {
                switch_only: false,
                read_only: &["ddnsHostnames", "serial", "mac"],
                ..device("/managementInterface", Shape::Singleton, 3)
            },
            PortConfig => CategoryDescriptor {
                read_only: PORT_READ_ONLY,
                references: PORT_REFS,
                ..device(
                    "/switch/ports",
                    Shape::Keyed {
                        key_field: "portId",
                    },
                    3,
                )
            },
            WarmSpare => device("/switch/warmSpare", Shape::Singleton, 3),
            RoutingInterface => device(
                "/switch/routing/interfaces",
                Shape::Collection {
                    id_field: "interfaceId",
                },
                4,
            ),
            StaticRoute => device(
                "/switch/routing/staticRoutes",
                Shape::Collection {
                    id_field: "staticRouteId",
                },
                5,
            ),
            RendezvousPoint => network(
                "/switch/routing/multicast/rendezvousPoints",
                Shape::Collection {
                    id_field: "rendezvousPointId",
                },
                5,
            ),
            InterfaceDhcp => device(
                "/switch/routing/interfaces/{parent}/dhcp",
                Shape::PerParent {
                    parent: RoutingInterface,
                },
                6,
            ),
        }
    }

    /// Whether some other category stores this category's ids
    pub fn is_reference_target(self) -> bool {
        ResourceCategory::ALL.iter().any(|other| {
            let descriptor = other.descriptor();
            descriptor.references.iter().any(|rule| rule.target() == self)
                || matches!(descriptor.shape, Shape::PerParent { parent } if parent == self)
        })
    }
}

/// Where a reference sits inside a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefLocation {
    /// JSON pointer into the payload
    Field { pointer: String },
    /// The resource path itself (per-parent categories)
    Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub target: ResourceCategory,
    pub source_id: String,
    pub location: RefLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub category: ResourceCategory,
    /// Owning device for device-scoped categories
    #[serde(default)]
    pub device_serial: Option<String>,
    /// Id in the source network; `None` for singletons
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub payload: Value,
}

impl ResourceRecord {
    pub fn new(category: ResourceCategory, device_serial: Option<&str>, payload: Value) -> Self {
        let descriptor = category.descriptor();
        let source_id = match descriptor.shape {
            Shape::Collection { id_field } => payload.get(id_field).and_then(id_string),
            Shape::Keyed { key_field } => payload.get(key_field).and_then(id_string),
            Shape::Singleton | Shape::PerParent { .. } => None,
        };
        let references = extract_references(&descriptor, &payload);

        Self {
            category,
            device_serial: device_serial.map(str::to_string),
            source_id,
            references,
            payload,
        }
    }

    /// Record owned by resource `parent_id` of the descriptor's parent category
    pub fn with_parent(
        category: ResourceCategory,
        device_serial: Option<&str>,
        parent_id: &str,
        payload: Value,
    ) -> Self {
        let mut record = Self::new(category, device_serial, payload);
        if let Shape::PerParent { parent } = category.descriptor().shape {
            record.source_id = Some(parent_id.to_string());
            record.references.push(Reference {
                target: parent,
                source_id: parent_id.to_string(),
                location: RefLocation::Path,
            });
        }
        record
    }

    /// `category[source_id]@serial`, for logs and reports
    pub fn label(&self) -> String {
        let mut label = self.category.to_string();
        if let Some(id) = &self.source_id {
            label.push_str(&format!("[{}]", id));
        }
        if let Some(serial) = &self.device_serial {
            label.push_str(&format!("@{}", serial));
        }
        label
    }
}

/// Ids arrive as strings or numbers depending on the category
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_references(descriptor: &CategoryDescriptor, payload: &Value) -> Vec<Reference> {
    let mut references = Vec::new();
    for rule in descriptor.references {
        match *rule {
            RefRule::Field { pointer, target } => {
                if let Some(id) = payload.pointer(pointer).and_then(id_string) {
                    references.push(Reference {
                        target,
                        source_id: id,
                        location: RefLocation::Field {
                            pointer: pointer.to_string(),
                        },
                    });
                }
            }
            RefRule::Each { pointer, target } => {
                let Some(items) = payload.pointer(pointer).and_then(Value::as_array) else {
                    continue;
                };
                for (index, item) in items.iter().enumerate() {
                    if let Some(id) = id_string(item) {
                        references.push(Reference {
                            target,
                            source_id: id,
                            location: RefLocation::Field {
                                pointer: format!("{}/{}", pointer, index),
                            },
                        });
                    }
                }
            }
        }
    }
    references
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub serial: String,
    #[serde(default)]
    pub name: Option<String>,
    pub model: String,
    /// Informational; stacks are not recreated
    #[serde(default)]
    pub stack_id: Option<String>,
}

impl DeviceRecord {
    pub fn is_stack_member(&self) -> bool {
        self.stack_id.is_some()
    }

    pub fn is_switch(&self) -> bool {
        self.model.starts_with("MS") || self.model.starts_with("C9")
    }
}

/// Immutable capture of a source network. Restore reads nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source_network_id: String,
    pub source_org_id: String,
    pub captured_at: DateTime<Utc>,
    pub network: Network,
    pub devices: Vec<DeviceRecord>,
    /// Network-level records first, then each device's records in device order
    pub resources: Vec<ResourceRecord>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Snapshot {
    pub fn records(&self, category: ResourceCategory) -> impl Iterator<Item = &ResourceRecord> {
        self.resources
            .iter()
            .filter(move |record| record.category == category)
    }

    pub fn device_records<'a>(&'a self, serial: &'a str) -> impl Iterator<Item = &'a ResourceRecord> {
        self.resources
            .iter()
            .filter(move |record| record.device_serial.as_deref() == Some(serial))
    }

    pub fn serials(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.serial.clone()).collect()
    }
}
