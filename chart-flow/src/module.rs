use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fhir::{Appointment, Meta, Patient};

/// Product module a FHIR resource is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceModule {
    #[serde(rename = "OTTEHR-IP")]
    InPerson,
    #[serde(rename = "OTTEHR-BH")]
    BehavioralHealth,
    #[serde(rename = "OTTEHR-TM")]
    Telemed,
}

impl ServiceModule {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceModule::InPerson => "OTTEHR-IP",
            ServiceModule::BehavioralHealth => "OTTEHR-BH",
            ServiceModule::Telemed => "OTTEHR-TM",
        }
    }
}

impl fmt::Display for ServiceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Resources carrying `meta.tag`
pub trait Tagged {
    fn meta(&self) -> Option<&Meta>;

    fn has_module_tag(&self, module: ServiceModule) -> bool {
        self.meta()
            .map(|meta| {
                meta.tag
                    .iter()
                    .any(|tag| tag.code.as_deref() == Some(module.code()))
            })
            .unwrap_or(false)
    }
}

impl Tagged for Appointment {
    fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }
}

impl Tagged for Patient {
    fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }
}

pub fn is_in_person_appointment(appointment: &Appointment) -> bool {
    appointment.has_module_tag(ServiceModule::InPerson)
}

pub fn is_behavioral_health_resource(resource: &impl Tagged) -> bool {
    resource.has_module_tag(ServiceModule::BehavioralHealth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhir::Coding;

    fn tagged(code: &str) -> Option<Meta> {
        Some(Meta {
            tag: vec![Coding {
                system: None,
                code: Some(code.to_string()),
                display: None,
            }],
            last_updated: None,
        })
    }

    #[test]
    fn detects_in_person_appointments() {
        let in_person = Appointment {
            meta: tagged("OTTEHR-IP"),
            status: "booked".to_string(),
            ..Appointment::default()
        };
        let telemed = Appointment {
            meta: tagged("OTTEHR-TM"),
            status: "booked".to_string(),
            ..Appointment::default()
        };

        assert!(is_in_person_appointment(&in_person));
        assert!(!is_in_person_appointment(&telemed));
        assert!(!is_in_person_appointment(&Appointment::default()));
    }

    #[test]
    fn detects_behavioral_health_on_any_tagged_resource() {
        let patient = Patient {
            meta: tagged("OTTEHR-BH"),
            ..Patient::default()
        };
        assert!(is_behavioral_health_resource(&patient));
        assert!(!is_behavioral_health_resource(&Patient::default()));
    }

    #[test]
    fn wire_codes_match_display() {
        for module in [
            ServiceModule::InPerson,
            ServiceModule::BehavioralHealth,
            ServiceModule::Telemed,
        ] {
            assert_eq!(
                serde_json::to_value(module).unwrap(),
                serde_json::Value::String(module.to_string())
            );
        }
    }
}
