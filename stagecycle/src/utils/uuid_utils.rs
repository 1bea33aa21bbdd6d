//! Identifier generation.

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Generates a fresh job id.
#[must_use]
pub fn generate_job_id() -> String {
    generate_uuid().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_job_ids_are_unique_uuids() {
        let ids: HashSet<String> = (0..100).map(|_| generate_job_id()).collect();
        assert_eq!(ids.len(), 100);

        let first = ids.iter().next().unwrap();
        assert_eq!(Uuid::parse_str(first).unwrap().get_version_num(), 4);
    }
}
