//! Sawmill address space: folder layout, variable node ids and the mapping
//! between OPC UA values and [`SawmillState`].

use opcua::server::prelude::*;

use crate::error::{Result, SawmillError};
use crate::simulator::SawmillState;

pub const ROOT_FOLDER: &str = "SawMill";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    States,
    Parameters,
    Counters,
    Alarms,
    Sensors,
}

impl Folder {
    pub const ALL: [Folder; 5] = [
        Folder::States,
        Folder::Parameters,
        Folder::Counters,
        Folder::Alarms,
        Folder::Sensors,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Folder::States => "States",
            Folder::Parameters => "Parameters",
            Folder::Counters => "Counters",
            Folder::Alarms => "Alarms",
            Folder::Sensors => "Sensors",
        }
    }

    pub fn path(self) -> String {
        format!("{}/{}", ROOT_FOLDER, self.name())
    }

    pub fn node_id(self, namespace: u16) -> NodeId {
        NodeId::new(namespace, self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SawmillVar {
    IsActive,
    IsWorking,
    IsStopped,
    CuttingSpeed,
    MotorSpeed,
    PowerConsumption,
    PiecesCount,
    HasAlarm,
    HasError,
    Temperature,
    Vibration,
    Pressure,
    Speed,
}

impl SawmillVar {
    pub const ALL: [SawmillVar; 13] = [
        SawmillVar::IsActive,
        SawmillVar::IsWorking,
        SawmillVar::IsStopped,
        SawmillVar::CuttingSpeed,
        SawmillVar::MotorSpeed,
        SawmillVar::PowerConsumption,
        SawmillVar::PiecesCount,
        SawmillVar::HasAlarm,
        SawmillVar::HasError,
        SawmillVar::Temperature,
        SawmillVar::Vibration,
        SawmillVar::Pressure,
        SawmillVar::Speed,
    ];

    /// Field name in [`SawmillState`].
    pub fn key(self) -> &'static str {
        match self {
            SawmillVar::IsActive => "is_active",
            SawmillVar::IsWorking => "is_working",
            SawmillVar::IsStopped => "is_stopped",
            SawmillVar::CuttingSpeed => "cutting_speed",
            SawmillVar::MotorSpeed => "motor_speed",
            SawmillVar::PowerConsumption => "power_consumption",
            SawmillVar::PiecesCount => "pieces_count",
            SawmillVar::HasAlarm => "has_alarm",
            SawmillVar::HasError => "has_error",
            SawmillVar::Temperature => "temperature",
            SawmillVar::Vibration => "vibration",
            SawmillVar::Pressure => "pressure",
            SawmillVar::Speed => "speed",
        }
    }

    pub fn browse_name(self) -> &'static str {
        match self {
            SawmillVar::IsActive => "IsActive",
            SawmillVar::IsWorking => "IsWorking",
            SawmillVar::IsStopped => "IsStopped",
            SawmillVar::CuttingSpeed => "CuttingSpeed",
            SawmillVar::MotorSpeed => "MotorSpeed",
            SawmillVar::PowerConsumption => "PowerConsumption",
            SawmillVar::PiecesCount => "PiecesCount",
            SawmillVar::HasAlarm => "HasAlarm",
            SawmillVar::HasError => "HasError",
            SawmillVar::Temperature => "Temperature",
            SawmillVar::Vibration => "Vibration",
            SawmillVar::Pressure => "Pressure",
            SawmillVar::Speed => "Speed",
        }
    }

    pub fn folder(self) -> Folder {
        match self {
            SawmillVar::IsActive | SawmillVar::IsWorking | SawmillVar::IsStopped => Folder::States,
            SawmillVar::CuttingSpeed | SawmillVar::MotorSpeed | SawmillVar::PowerConsumption => {
                Folder::Parameters
            }
            SawmillVar::PiecesCount => Folder::Counters,
            SawmillVar::HasAlarm | SawmillVar::HasError => Folder::Alarms,
            SawmillVar::Temperature
            | SawmillVar::Vibration
            | SawmillVar::Pressure
            | SawmillVar::Speed => Folder::Sensors,
        }
    }

    /// e.g. `SawMill/States/IsActive`
    pub fn node_path(self) -> String {
        format!("{}/{}", self.folder().path(), self.browse_name())
    }

    pub fn node_id(self, namespace: u16) -> NodeId {
        NodeId::new(namespace, self.node_path())
    }

    pub fn data_type(self) -> DataTypeId {
        match self {
            SawmillVar::IsActive
            | SawmillVar::IsWorking
            | SawmillVar::IsStopped
            | SawmillVar::HasAlarm
            | SawmillVar::HasError => DataTypeId::Boolean,
            SawmillVar::PiecesCount => DataTypeId::Int64,
            _ => DataTypeId::Double,
        }
    }

    pub fn value_of(self, state: &SawmillState) -> Variant {
        match self {
            SawmillVar::IsActive => state.is_active.into(),
            SawmillVar::IsWorking => state.is_working.into(),
            SawmillVar::IsStopped => state.is_stopped.into(),
            SawmillVar::CuttingSpeed => state.cutting_speed.into(),
            SawmillVar::MotorSpeed => state.motor_speed.into(),
            SawmillVar::PowerConsumption => state.power_consumption.into(),
            SawmillVar::PiecesCount => state.pieces_count.into(),
            SawmillVar::HasAlarm => state.has_alarm.into(),
            SawmillVar::HasError => state.has_error.into(),
            SawmillVar::Temperature => state.temperature.into(),
            SawmillVar::Vibration => state.vibration.into(),
            SawmillVar::Pressure => state.pressure.into(),
            SawmillVar::Speed => state.speed.into(),
        }
    }

    /// Stores `value` into the matching field. Returns false and leaves the
    /// state untouched when the variant cannot represent the field.
    pub fn apply(self, state: &mut SawmillState, value: &Variant) -> bool {
        let flag = |target: &mut bool| match variant_as_bool(value) {
            Some(v) => {
                *target = v;
                true
            }
            None => false,
        };
        let real = |target: &mut f64| match variant_as_f64(value) {
            Some(v) => {
                *target = v;
                true
            }
            None => false,
        };

        match self {
            SawmillVar::IsActive => flag(&mut state.is_active),
            SawmillVar::IsWorking => flag(&mut state.is_working),
            SawmillVar::IsStopped => flag(&mut state.is_stopped),
            SawmillVar::HasAlarm => flag(&mut state.has_alarm),
            SawmillVar::HasError => flag(&mut state.has_error),
            SawmillVar::CuttingSpeed => real(&mut state.cutting_speed),
            SawmillVar::MotorSpeed => real(&mut state.motor_speed),
            SawmillVar::PowerConsumption => real(&mut state.power_consumption),
            SawmillVar::Temperature => real(&mut state.temperature),
            SawmillVar::Vibration => real(&mut state.vibration),
            SawmillVar::Pressure => real(&mut state.pressure),
            SawmillVar::Speed => real(&mut state.speed),
            SawmillVar::PiecesCount => match variant_as_i64(value) {
                Some(v) => {
                    state.pieces_count = v;
                    true
                }
                None => false,
            },
        }
    }
}

fn variant_as_bool(value: &Variant) -> Option<bool> {
    match value {
        Variant::Boolean(v) => Some(*v),
        _ => None,
    }
}

/// Finite readings only; NaN and infinities are treated as unusable.
fn variant_as_f64(value: &Variant) -> Option<f64> {
    let v = match value {
        Variant::Double(v) => *v,
        Variant::Float(v) => f64::from(*v),
        _ => variant_as_i64(value)? as f64,
    };
    v.is_finite().then_some(v)
}

fn variant_as_i64(value: &Variant) -> Option<i64> {
    match value {
        Variant::SByte(v) => Some(i64::from(*v)),
        Variant::Byte(v) => Some(i64::from(*v)),
        Variant::Int16(v) => Some(i64::from(*v)),
        Variant::UInt16(v) => Some(i64::from(*v)),
        Variant::Int32(v) => Some(i64::from(*v)),
        Variant::UInt32(v) => Some(i64::from(*v)),
        Variant::Int64(v) => Some(*v),
        Variant::UInt64(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

/// Handle on the registered sawmill nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SawmillNodes {
    namespace: u16,
}

impl SawmillNodes {
    /// Registers the namespace and creates the folder tree and the writable
    /// process variables, seeded from `initial`.
    pub fn register(
        address_space: &mut AddressSpace,
        namespace_uri: &str,
        initial: &SawmillState,
    ) -> Result<Self> {
        let namespace = address_space
            .register_namespace(namespace_uri)
            .map_err(|_| SawmillError::address_space(format!("cannot register {namespace_uri}")))?;
        tracing::info!("Registered namespace with index {}: {}", namespace, namespace_uri);

        let root_id = NodeId::new(namespace, ROOT_FOLDER);
        if !address_space.add_folder_with_id(
            &root_id,
            ROOT_FOLDER,
            ROOT_FOLDER,
            &NodeId::objects_folder_id(),
        ) {
            return Err(SawmillError::address_space("cannot create SawMill folder"));
        }

        for folder in Folder::ALL {
            if !address_space.add_folder_with_id(
                &folder.node_id(namespace),
                folder.name(),
                folder.name(),
                &root_id,
            ) {
                return Err(SawmillError::address_space(format!(
                    "cannot create folder {}",
                    folder.path()
                )));
            }
        }

        for var in SawmillVar::ALL {
            let node_id = var.node_id(namespace);
            let inserted = VariableBuilder::new(&node_id, var.browse_name(), var.browse_name())
                .data_type(var.data_type())
                .value(var.value_of(initial))
                .writable()
                .organized_by(&var.folder().node_id(namespace))
                .insert(address_space);
            if !inserted {
                return Err(SawmillError::address_space(format!(
                    "cannot create variable {}",
                    var.node_path()
                )));
            }
            tracing::info!("Created variable {} with node ID: {}", var.key(), node_id);
        }

        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> u16 {
        self.namespace
    }

    /// Current values, including anything clients have written since the
    /// last tick. Fields whose node holds an unusable value keep `previous`.
    pub fn read_state(&self, address_space: &AddressSpace, previous: &SawmillState) -> SawmillState {
        let mut state = previous.clone();
        for var in SawmillVar::ALL {
            let node_id = var.node_id(self.namespace);
            let value = match address_space.find_node(&node_id) {
                Some(NodeType::Variable(variable)) => variable
                    .value(
                        TimestampsToReturn::Neither,
                        NumericRange::None,
                        &QualifiedName::null(),
                        0.0,
                    )
                    .value,
                _ => None,
            };

            match value {
                Some(value) => {
                    if !var.apply(&mut state, &value) {
                        tracing::warn!(
                            "Ignoring {:?} written to {}, keeping previous value",
                            value,
                            node_id
                        );
                    }
                }
                None => tracing::warn!("No value for {}", node_id),
            }
        }
        state
    }

    pub fn write_state(&self, address_space: &mut AddressSpace, state: &SawmillState) -> Result<()> {
        let now = DateTime::now();
        for var in SawmillVar::ALL {
            if !address_space.set_variable_value(
                var.node_id(self.namespace),
                var.value_of(state),
                &now,
                &now,
            ) {
                return Err(SawmillError::address_space(format!(
                    "variable {} is missing",
                    var.node_path()
                )));
            }
        }
        Ok(())
    }
}
