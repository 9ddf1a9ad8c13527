use sea_orm::entity::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum RecordStatus {
    #[sea_orm(string_value = "NEW")]
    New,
    #[sea_orm(string_value = "UPDATED")]
    Updated,
    #[sea_orm(string_value = "DELETED")]
    Deleted,
}

impl Default for RecordStatus {
    fn default() -> Self {
        RecordStatus::New
    }
}

impl RecordStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RecordStatus::New => "NEW",
            RecordStatus::Updated => "UPDATED",
            RecordStatus::Deleted => "DELETED",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
