//! Built-in mapping for the ISO/Dublin Core metadata schema
//!
//! Every queryable lives either on `datasets` or on a secondary table joined
//! back through `datasets.id = <table>.fk_datasets`. Several names map to the
//! same column because the APISO, DC and CSW vocabularies overlap.

use super::errors::MappingResult;
use super::types::{Join, MappedProperty, PropertyMapping, ValueType};

/// Root table of the metadata schema
pub const DATASETS: &str = "datasets";

/// Foreign key column shared by all secondary tables
pub const FK_DATASETS: &str = "fk_datasets";

/// (names, table, column, type)
const QUERYABLES: &[(&[&str], &str, &str, ValueType)] = &[
    (&["title", "Title"], "isoqp_title", "title", ValueType::Text),
    (&["abstract", "Abstract"], "isoqp_abstract", "abstract", ValueType::Text),
    (&["BoundingBox", "boundingBox", "coverage"], "isoqp_boundingbox", "bbox", ValueType::Geometry),
    (&["type", "Type"], "isoqp_type", "type", ValueType::Text),
    (&["format", "Format"], "isoqp_format", "format", ValueType::Text),
    (&["subject", "Subject"], "isoqp_keyword", "keyword", ValueType::Text),
    (&["KeywordType"], "isoqp_keyword", "keywordtype", ValueType::Text),
    (&["AnyText", "anyText"], DATASETS, "anytext", ValueType::Text),
    (&["identifier", "Identifier"], "qp_identifier", "identifier", ValueType::Text),
    (&["modified", "Modified"], DATASETS, "modified", ValueType::Timestamp),
    (&["CRS"], "isoqp_crs", "crs", ValueType::Text),
    (&["association", "Association", "Relation"], "isoqp_association", "relation", ValueType::Text),
    (&["language", "Language"], DATASETS, "language", ValueType::Text),
    (&["ResourceLanguage"], DATASETS, "resourcelanguage", ValueType::Text),
    (&["ParentIdentifier"], DATASETS, "parentidentifier", ValueType::Text),
    (&["HasSecurityConstraint"], DATASETS, "hassecurityconstraint", ValueType::Boolean),
    (&["RevisionDate"], "isoqp_revisiondate", "revisiondate", ValueType::Timestamp),
    (&["CreationDate"], "isoqp_creationdate", "creationdate", ValueType::Timestamp),
    (&["PublicationDate"], "isoqp_publicationdate", "publicationdate", ValueType::Timestamp),
    (&["AlternateTitle"], "isoqp_alternatetitle", "alternatetitle", ValueType::Text),
    (&["OrganisationName"], "isoqp_organisationname", "organisationname", ValueType::Text),
    (&["ResourceIdentifier"], "isoqp_resourceidentifier", "resourceidentifier", ValueType::Text),
    (&["TopicCategory"], "isoqp_topiccategory", "topiccategory", ValueType::Text),
    (&["GeographicDescriptionCode"], "isoqp_geographicdescriptioncode", "geographicdescriptioncode", ValueType::Text),
    (&["Denominator"], "isoqp_spatialresolution", "denominator", ValueType::Integer),
    (&["DistanceValue"], "isoqp_spatialresolution", "distancevalue", ValueType::Float),
    (&["DistanceUOM"], "isoqp_spatialresolution", "distanceuom", ValueType::Text),
    (&["TempExtent_begin"], "isoqp_temporalextent", "tempextent_begin", ValueType::Timestamp),
    (&["TempExtent_end"], "isoqp_temporalextent", "tempextent_end", ValueType::Timestamp),
    (&["ServiceType"], "isoqp_servicetype", "servicetype", ValueType::Text),
    (&["ServiceTypeVersion"], "isoqp_servicetypeversion", "servicetypeversion", ValueType::Text),
    (&["Operation"], "isoqp_operation", "operation", ValueType::Text),
    (&["OperatesOn"], "isoqp_operatesondata", "operateson", ValueType::Text),
    (&["OperatesOnIdentifier"], "isoqp_operatesondata", "operatesonidentifier", ValueType::Text),
    (&["OperatesOnName"], "isoqp_operatesondata", "operatesonname", ValueType::Text),
    (&["CouplingType"], "isoqp_couplingtype", "couplingtype", ValueType::Text),
    (&["Degree"], "addqp_degree", "degree", ValueType::Boolean),
    (&["AccessConstraints"], "addqp_accessconstraint", "accessconstraint", ValueType::Text),
    (&["OtherConstraints"], "addqp_otherconstraint", "otherconstraint", ValueType::Text),
    (&["Classification"], "addqp_classification", "classification", ValueType::Text),
    (&["ConditionApplyingToAccessAndUse"], "addqp_limitation", "limitation", ValueType::Text),
    (&["Lineage"], "addqp_lineage", "lineage", ValueType::Text),
    (&["SpecificationTitle"], "addqp_specification", "specificationtitle", ValueType::Text),
    (&["SpecificationDateType"], "addqp_specification", "specificationdatetype", ValueType::Text),
    (&["SpecificationDate"], "addqp_specification", "specificationdate", ValueType::Timestamp),
];

/// Mapping of the ISO application profile queryables onto the metadata schema
pub fn iso_queryables() -> MappingResult<PropertyMapping> {
    let mut builder = PropertyMapping::builder(DATASETS, "id");

    for (names, table, column, value_type) in QUERYABLES {
        let property = if *table == DATASETS {
            MappedProperty::root(DATASETS, *column, *value_type)
        } else {
            let join = Join::new(DATASETS, "id", *table, FK_DATASETS);
            MappedProperty::joined(*table, *column, *value_type, vec![join])
        };
        for name in *names {
            builder = builder.property(*name, property.clone());
        }
    }

    builder.build()
}
