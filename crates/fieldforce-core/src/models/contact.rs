//! Doctor and chemist directories.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSpecialty {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemistCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub specialty: Option<i64>,
    #[serde(default)]
    pub specialty_details: Option<DoctorSpecialty>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub added_by: Option<i64>,
}

impl Doctor {
    pub fn specialty_name(&self) -> Option<&str> {
        self.specialty_details.as_ref().map(|s| s.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chemist {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: Option<i64>,
    #[serde(default)]
    pub category_details: Option<ChemistCategory>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub added_by: Option<i64>,
}

impl Chemist {
    pub fn category_name(&self) -> Option<&str> {
        self.category_details.as_ref().map(|c| c.name.as_str())
    }
}

/// Create/update payload for either directory. `kind_id` is the specialty
/// for doctors and the category for chemists.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip)]
    pub kind_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ContactInput {
    pub(crate) fn doctor_body(&self) -> serde_json::Value {
        self.body_with("specialty")
    }

    pub(crate) fn chemist_body(&self) -> serde_json::Value {
        self.body_with("category")
    }

    fn body_with(&self, kind_field: &str) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let (Some(kind_id), Some(map)) = (self.kind_id, value.as_object_mut()) {
            map.insert(kind_field.to_string(), kind_id.into());
        }
        value
    }
}
