use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sizes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_sizes::Entity")]
    ProductLinks,
}

impl Related<super::product_sizes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
