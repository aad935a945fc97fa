use serde::{Deserialize, Serialize};

use super::report::ReportCategory;

/// The per-category answer set of a report, typed instead of stringly. The
/// storage shape stays the flat `(question_key, answer_value)` rows the
/// detail table expects; `flatten` is the single place where the variants
/// turn into that shape, in a fixed key order the report page relies on for
/// grouping.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ReportAttributes {
    NearMiss(NearMissAttributes),
    Injury(CasualtyAttributes),
    Illness(IllnessAttributes),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NearMissAttributes {
    pub title: String,
    pub near_miss_type: String,
    pub date: String,
    pub time: String,
    pub reported_date_time: String,
    pub process_type: String,
    pub person_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<String>,
    pub description: String,
    pub possible_consequences: String,
    pub unsafe_act_by: String,
    pub responsible_area_manager: String,
}

/// Shared answer set of the injury and illness categories.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CasualtyAttributes {
    pub title: String,
    pub date: String,
    pub time: String,
    pub reported_date_time: String,
    pub process_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<String>,
    pub object_substances_involved: String,
    pub possible_cause: String,
    pub description: String,
    pub immediate_action_taken: String,
    #[serde(flatten)]
    pub person_affected: PersonAffected,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IllnessAttributes {
    #[serde(flatten)]
    pub casualty: CasualtyAttributes,
    pub symptoms: String,
}

/// Sub-schema keyed by who got hurt.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "person_affected_type", rename_all = "snake_case")]
pub enum PersonAffected {
    Employee(EmployeeDetails),
    Contractor(ContractorDetails),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EmployeeDetails {
    pub employee_code: String,
    pub employee_name: String,
    pub injury_type: String,
    pub injury_nature: String,
    pub body_parts_affected: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContractorDetails {
    pub contractor_type: ContractorKind,
    pub contractor_agency: String,
    pub contractor_name: String,
    pub injury_nature: String,
    pub body_parts_affected: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContractorKind {
    Contractor,
    Vendor,
    Visitor,
}

impl std::fmt::Display for ContractorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractorKind::Contractor => write!(f, "contractor"),
            ContractorKind::Vendor => write!(f, "vendor"),
            ContractorKind::Visitor => write!(f, "visitor"),
        }
    }
}

impl ReportAttributes {
    pub fn category(&self) -> ReportCategory {
        match self {
            ReportAttributes::NearMiss(_) => ReportCategory::NearMiss,
            ReportAttributes::Injury(_) => ReportCategory::Injury,
            ReportAttributes::Illness(_) => ReportCategory::Illness,
        }
    }

    /// Flattens the active variant into the ordered key/value rows stored as
    /// report details. Absent optional answers are omitted; an empty string
    /// is a present answer and is kept. `location_name` is the best-effort
    /// resolved site name for near misses and is skipped when unresolved.
    pub fn flatten(&self, location_name: Option<&str>) -> Vec<(&'static str, String)> {
        let mut entries: Vec<(&'static str, String)> = Vec::new();
        match self {
            ReportAttributes::NearMiss(attributes) => {
                entries.push(("title", attributes.title.clone()));
                entries.push(("near_miss_type", attributes.near_miss_type.clone()));
                entries.push(("date", attributes.date.clone()));
                entries.push(("time", attributes.time.clone()));
                entries.push(("reported_date_time", attributes.reported_date_time.clone()));
                entries.push(("process_type", attributes.process_type.clone()));
                entries.push(("person_type", attributes.person_type.clone()));
                if let Some(witness) = &attributes.witness {
                    entries.push(("witness", witness.clone()));
                }
                entries.push(("description", attributes.description.clone()));
                entries.push((
                    "possible_consequences",
                    attributes.possible_consequences.clone(),
                ));
                entries.push(("unsafe_act_by", attributes.unsafe_act_by.clone()));
                entries.push((
                    "responsible_area_manager",
                    attributes.responsible_area_manager.clone(),
                ));
                if let Some(location_name) = location_name {
                    entries.push(("location_name", location_name.to_string()));
                }
            }
            ReportAttributes::Injury(casualty) => {
                casualty.flatten_into(&mut entries);
            }
            ReportAttributes::Illness(attributes) => {
                attributes.casualty.flatten_into(&mut entries);
                entries.push(("symptoms", attributes.symptoms.clone()));
            }
        }
        entries
    }
}

impl CasualtyAttributes {
    fn flatten_into(&self, entries: &mut Vec<(&'static str, String)>) {
        entries.push(("title", self.title.clone()));
        entries.push(("date", self.date.clone()));
        entries.push(("time", self.time.clone()));
        entries.push(("reported_date_time", self.reported_date_time.clone()));
        entries.push(("process_type", self.process_type.clone()));
        if let Some(witness) = &self.witness {
            entries.push(("witness", witness.clone()));
        }
        entries.push((
            "object_substances_involved",
            self.object_substances_involved.clone(),
        ));
        entries.push(("possible_cause", self.possible_cause.clone()));
        entries.push(("description", self.description.clone()));
        entries.push(("immediate_action_taken", self.immediate_action_taken.clone()));
        match &self.person_affected {
            PersonAffected::Employee(employee) => {
                entries.push(("person_affected_type", "employee".to_string()));
                entries.push(("employee_code", employee.employee_code.clone()));
                entries.push(("employee_name", employee.employee_name.clone()));
                entries.push(("injury_type", employee.injury_type.clone()));
                entries.push(("injury_nature", employee.injury_nature.clone()));
                entries.push(("body_parts_affected", employee.body_parts_affected.clone()));
            }
            PersonAffected::Contractor(contractor) => {
                entries.push(("person_affected_type", "contractor".to_string()));
                entries.push(("contractor_type", contractor.contractor_type.to_string()));
                entries.push(("contractor_agency", contractor.contractor_agency.clone()));
                entries.push(("contractor_name", contractor.contractor_name.clone()));
                entries.push(("injury_nature", contractor.injury_nature.clone()));
                entries.push((
                    "body_parts_affected",
                    contractor.body_parts_affected.clone(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn near_miss() -> NearMissAttributes {
        NearMissAttributes {
            title: "Forklift near collision".to_string(),
            near_miss_type: "collision".to_string(),
            date: "2024-03-11".to_string(),
            time: "14:30".to_string(),
            reported_date_time: "2024-03-11T15:00".to_string(),
            process_type: "logistics".to_string(),
            person_type: "operator".to_string(),
            witness: Some("J. Perez".to_string()),
            description: "Forklift reversed without spotter".to_string(),
            possible_consequences: "Crush injury".to_string(),
            unsafe_act_by: "Driver".to_string(),
            responsible_area_manager: "M. Chen".to_string(),
        }
    }

    fn employee_casualty() -> CasualtyAttributes {
        CasualtyAttributes {
            title: "Hand laceration".to_string(),
            date: "2024-03-12".to_string(),
            time: "09:15".to_string(),
            reported_date_time: "2024-03-12T09:40".to_string(),
            process_type: "maintenance".to_string(),
            witness: None,
            object_substances_involved: "Box cutter".to_string(),
            possible_cause: "Dull blade".to_string(),
            description: "Cut while opening crate".to_string(),
            immediate_action_taken: "First aid applied".to_string(),
            person_affected: PersonAffected::Employee(EmployeeDetails {
                employee_code: "E-1042".to_string(),
                employee_name: "A. Kumar".to_string(),
                injury_type: "Cut".to_string(),
                injury_nature: "Laceration".to_string(),
                body_parts_affected: "Left hand".to_string(),
            }),
        }
    }

    fn contractor_casualty() -> CasualtyAttributes {
        CasualtyAttributes {
            person_affected: PersonAffected::Contractor(ContractorDetails {
                contractor_type: ContractorKind::Vendor,
                contractor_agency: "Acme Services".to_string(),
                contractor_name: "B. Silva".to_string(),
                injury_nature: "Sprain".to_string(),
                body_parts_affected: "Right ankle".to_string(),
            }),
            ..employee_casualty()
        }
    }

    fn keys(entries: &[(&'static str, String)]) -> Vec<&'static str> {
        entries.iter().map(|(key, _)| *key).collect()
    }

    #[test]
    fn near_miss_emits_fixed_key_order() {
        let attributes = ReportAttributes::NearMiss(near_miss());
        assert_eq!(
            keys(&attributes.flatten(Some("Plant A"))),
            vec![
                "title",
                "near_miss_type",
                "date",
                "time",
                "reported_date_time",
                "process_type",
                "person_type",
                "witness",
                "description",
                "possible_consequences",
                "unsafe_act_by",
                "responsible_area_manager",
                "location_name",
            ]
        );
    }

    #[test]
    fn near_miss_tolerates_unresolved_location() {
        let attributes = ReportAttributes::NearMiss(near_miss());
        let entries = attributes.flatten(None);
        assert!(!keys(&entries).contains(&"location_name"));
    }

    #[test]
    fn absent_witness_is_omitted() {
        let mut raw = near_miss();
        raw.witness = None;
        let entries = ReportAttributes::NearMiss(raw).flatten(None);
        assert!(!keys(&entries).contains(&"witness"));
    }

    #[test]
    fn empty_answer_is_preserved() {
        let mut raw = near_miss();
        raw.unsafe_act_by = String::new();
        let entries = ReportAttributes::NearMiss(raw).flatten(None);
        let unsafe_act = entries
            .iter()
            .find(|(key, _)| *key == "unsafe_act_by")
            .unwrap();
        assert_eq!(unsafe_act.1, "");
    }

    #[test]
    fn injury_employee_emits_fixed_key_order() {
        let attributes = ReportAttributes::Injury(employee_casualty());
        assert_eq!(
            keys(&attributes.flatten(None)),
            vec![
                "title",
                "date",
                "time",
                "reported_date_time",
                "process_type",
                "object_substances_involved",
                "possible_cause",
                "description",
                "immediate_action_taken",
                "person_affected_type",
                "employee_code",
                "employee_name",
                "injury_type",
                "injury_nature",
                "body_parts_affected",
            ]
        );
    }

    #[test]
    fn injury_contractor_swaps_person_sub_schema() {
        let attributes = ReportAttributes::Injury(contractor_casualty());
        let entries = attributes.flatten(None);
        let entry_keys = keys(&entries);
        assert!(entry_keys.contains(&"contractor_type"));
        assert!(entry_keys.contains(&"contractor_agency"));
        assert!(entry_keys.contains(&"contractor_name"));
        assert!(!entry_keys.contains(&"employee_code"));
        assert!(!entry_keys.contains(&"employee_name"));
        let kind = entries
            .iter()
            .find(|(key, _)| *key == "contractor_type")
            .unwrap();
        assert_eq!(kind.1, "vendor");
    }

    #[test]
    fn illness_appends_symptoms() {
        let attributes = ReportAttributes::Illness(IllnessAttributes {
            casualty: employee_casualty(),
            symptoms: "Dizziness, nausea".to_string(),
        });
        let entries = attributes.flatten(None);
        assert_eq!(entries.last().unwrap().0, "symptoms");
        assert_eq!(entries.last().unwrap().1, "Dizziness, nausea");
    }

    #[test]
    fn category_follows_active_variant() {
        assert_eq!(
            ReportAttributes::NearMiss(near_miss()).category(),
            ReportCategory::NearMiss
        );
        assert_eq!(
            ReportAttributes::Injury(employee_casualty()).category(),
            ReportCategory::Injury
        );
    }

    #[test]
    fn wire_payload_deserializes_by_category_tag() {
        let payload = serde_json::json!({
            "category": "injury",
            "title": "Hand laceration",
            "date": "2024-03-12",
            "time": "09:15",
            "reported_date_time": "2024-03-12T09:40",
            "process_type": "maintenance",
            "object_substances_involved": "Box cutter",
            "possible_cause": "Dull blade",
            "description": "Cut while opening crate",
            "immediate_action_taken": "First aid applied",
            "person_affected_type": "employee",
            "employee_code": "E-1042",
            "employee_name": "A. Kumar",
            "injury_type": "Cut",
            "injury_nature": "Laceration",
            "body_parts_affected": "Left hand",
        });
        let attributes: ReportAttributes = serde_json::from_value(payload).unwrap();
        assert_eq!(attributes.category(), ReportCategory::Injury);
        match attributes {
            ReportAttributes::Injury(casualty) => match casualty.person_affected {
                PersonAffected::Employee(employee) => {
                    assert_eq!(employee.employee_code, "E-1042")
                }
                PersonAffected::Contractor(_) => panic!("expected employee sub-schema"),
            },
            _ => panic!("expected injury attributes"),
        }
    }
}
