// Vehicle domain model
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vehicle {
    pub id: String,
    pub name: String,
}

impl Vehicle {
    pub fn new(id: String) -> Self {
        let name = Self::format_name(&id);
        Self { id, name }
    }

    fn format_name(id: &str) -> String {
        // "101" -> "Vehicle 101", "Night_Shuttle_" -> "Night Shuttle"
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            format!("Vehicle {}", id)
        } else {
            id.trim_end_matches('_').replace('_', " ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_name() {
        let vehicle = Vehicle::new("101".to_string());
        assert_eq!(vehicle.name, "Vehicle 101");

        let vehicle = Vehicle::new("Night_Shuttle_".to_string());
        assert_eq!(vehicle.name, "Night Shuttle");
    }
}
