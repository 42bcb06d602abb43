//! Procedure locations for spatial pre-filtering
//!
//! Observation rows carry a procedure id, not a geometry. A spatial filter on
//! the location property is answered here, against the configured procedure
//! locations, and becomes a membership test on the procedure column.

use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, QueryResult};
use crate::filter::{Envelope, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: String,
    pub location: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureCatalog {
    /// Property name spatial filters use to address procedure locations
    location_property: String,
    procedures: Vec<Procedure>,
}

impl ProcedureCatalog {
    pub fn new(location_property: impl Into<String>) -> Self {
        Self {
            location_property: location_property.into(),
            procedures: Vec::new(),
        }
    }

    pub fn with_procedure(mut self, id: impl Into<String>, location: Point) -> Self {
        self.procedures.push(Procedure {
            id: id.into(),
            location,
        });
        self
    }

    pub fn location_property(&self) -> &str {
        &self.location_property
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    /// Ids of procedures located inside `envelope`, in declaration order.
    /// Locations are not reprojected; a procedure in another SRID is an error.
    pub fn within_envelope(&self, envelope: &Envelope) -> QueryResult<Vec<String>> {
        self.select(envelope.srid, |p| envelope.contains(&p.location))
    }

    pub fn within_distance(&self, center: &Point, distance: f64) -> QueryResult<Vec<String>> {
        self.select(center.srid, |p| p.location.distance_to(center) <= distance)
    }

    pub fn beyond_distance(&self, center: &Point, distance: f64) -> QueryResult<Vec<String>> {
        self.select(center.srid, |p| p.location.distance_to(center) > distance)
    }

    fn select(&self, srid: i32, keep: impl Fn(&Procedure) -> bool) -> QueryResult<Vec<String>> {
        if let Some(p) = self.procedures.iter().find(|p| p.location.srid != srid) {
            return Err(QueryError::InvalidEnvelope(format!(
                "request is in srid {} but procedure '{}' is located in srid {}",
                srid, p.id, p.location.srid
            )));
        }
        Ok(self
            .procedures
            .iter()
            .filter(|p| keep(p))
            .map(|p| p.id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ProcedureCatalog {
        ProcedureCatalog::new("location")
            .with_procedure("bonn", Point::new(7.1, 50.7, 4326))
            .with_procedure("koeln", Point::new(6.9, 50.9, 4326))
    }

    #[test]
    fn test_within_envelope_keeps_declaration_order() {
        let hits = catalog()
            .within_envelope(&Envelope::new(6.0, 50.0, 8.0, 51.0, 4326))
            .unwrap();
        assert_eq!(hits, vec!["bonn".to_string(), "koeln".to_string()]);
    }

    #[test]
    fn test_envelope_without_procedures() {
        let hits = catalog()
            .within_envelope(&Envelope::new(-10.0, -10.0, -9.0, -9.0, 4326))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_distance_partitions_catalog() {
        let center = Point::new(7.1, 50.7, 4326);
        assert_eq!(catalog().within_distance(&center, 0.1).unwrap(), vec!["bonn".to_string()]);
        assert_eq!(catalog().beyond_distance(&center, 0.1).unwrap(), vec!["koeln".to_string()]);
    }

    #[test]
    fn test_mismatched_srid_rejected() {
        let envelope = Envelope::new(6.0, 50.0, 8.0, 51.0, 25832);
        assert!(matches!(
            catalog().within_envelope(&envelope),
            Err(QueryError::InvalidEnvelope(_))
        ));
        assert!(matches!(
            catalog().beyond_distance(&Point::new(7.1, 50.7, 31466), 1.0),
            Err(QueryError::InvalidEnvelope(_))
        ));
    }
}
