use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// What a request, delivery or reception line refers to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    #[sea_orm(string_value = "ARTICLE")]
    Article,
    #[sea_orm(string_value = "ASSET")]
    Asset,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Article => "ARTICLE",
            ItemKind::Asset => "ASSET",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organisational unit flavours, all stored in `org_units`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgUnitKind {
    #[sea_orm(string_value = "LOCATION")]
    Location,
    #[sea_orm(string_value = "WORKSHOP")]
    Workshop,
    #[sea_orm(string_value = "AREA")]
    Area,
    #[sea_orm(string_value = "DEPARTMENT")]
    Department,
}

impl OrgUnitKind {
    pub fn slug(&self) -> &'static str {
        match self {
            OrgUnitKind::Location => "locations",
            OrgUnitKind::Workshop => "workshops",
            OrgUnitKind::Area => "areas",
            OrgUnitKind::Department => "departments",
        }
    }
}

impl FromStr for OrgUnitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "locations" => Ok(OrgUnitKind::Location),
            "workshops" => Ok(OrgUnitKind::Workshop),
            "areas" => Ok(OrgUnitKind::Area),
            "departments" => Ok(OrgUnitKind::Department),
            other => Err(format!("Unknown organisational unit kind: {}", other)),
        }
    }
}

/// Classification catalogs stored in `catalog_entries`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogKind {
    #[sea_orm(string_value = "CATEGORY")]
    Category,
    #[sea_orm(string_value = "UNIT_OF_MEASURE")]
    UnitOfMeasure,
    #[sea_orm(string_value = "BRAND")]
    Brand,
    #[sea_orm(string_value = "MOVEMENT_TYPE")]
    MovementType,
    #[sea_orm(string_value = "REQUEST_TYPE")]
    RequestType,
    #[sea_orm(string_value = "RECEPTION_TYPE")]
    ReceptionType,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 6] = [
        CatalogKind::Category,
        CatalogKind::UnitOfMeasure,
        CatalogKind::Brand,
        CatalogKind::MovementType,
        CatalogKind::RequestType,
        CatalogKind::ReceptionType,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            CatalogKind::Category => "categories",
            CatalogKind::UnitOfMeasure => "units",
            CatalogKind::Brand => "brands",
            CatalogKind::MovementType => "movement-types",
            CatalogKind::RequestType => "request-types",
            CatalogKind::ReceptionType => "reception-types",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CatalogKind::Category => "Category",
            CatalogKind::UnitOfMeasure => "Unit of measure",
            CatalogKind::Brand => "Brand",
            CatalogKind::MovementType => "Movement type",
            CatalogKind::RequestType => "Request type",
            CatalogKind::ReceptionType => "Reception type",
        }
    }
}

impl FromStr for CatalogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CatalogKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| format!("Unknown catalog: {}", s))
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_slugs_round_trip() {
        for kind in CatalogKind::ALL {
            assert_eq!(kind.slug().parse::<CatalogKind>().unwrap(), kind);
        }
        assert!("colors".parse::<CatalogKind>().is_err());
    }

    #[test]
    fn org_unit_slugs() {
        assert_eq!(
            "departments".parse::<OrgUnitKind>().unwrap(),
            OrgUnitKind::Department
        );
        assert_eq!(OrgUnitKind::Workshop.slug(), "workshops");
        assert!("teams".parse::<OrgUnitKind>().is_err());
    }
}
