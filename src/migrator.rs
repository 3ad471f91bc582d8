use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_accounts_tables::Migration),
            Box::new(m20240101_000002_create_org_and_catalog_tables::Migration),
            Box::new(m20240101_000003_create_warehouse_tables::Migration),
            Box::new(m20240101_000004_create_procurement_tables::Migration),
            Box::new(m20240101_000005_create_request_tables::Migration),
            Box::new(m20240101_000006_create_audit_logs_table::Migration),
        ]
    }
}

/// Creates accounts: users, groups, permissions and their link tables.
mod m20240101_000001_create_accounts_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_accounts_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::Username)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Users::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Users::FirstName)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Users::LastName)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::IsSuperuser)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Users::LastLogin).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Users::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Users::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Groups::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Groups::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Groups::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Groups::Description).text().null())
                        .col(ColumnDef::new(Groups::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Permissions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Permissions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Permissions::Codename)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Permissions::Name).string().not_null())
                        .col(ColumnDef::new(Permissions::Module).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_permissions_module")
                        .table(Permissions::Table)
                        .col(Permissions::Module)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserGroups::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(UserGroups::UserId).uuid().not_null())
                        .col(ColumnDef::new(UserGroups::GroupId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(UserGroups::UserId)
                                .col(UserGroups::GroupId)
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_groups_user")
                                .from(UserGroups::Table, UserGroups::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_groups_group")
                                .from(UserGroups::Table, UserGroups::GroupId)
                                .to(Groups::Table, Groups::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(GroupPermissions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(GroupPermissions::GroupId).uuid().not_null())
                        .col(ColumnDef::new(GroupPermissions::PermissionId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(GroupPermissions::GroupId)
                                .col(GroupPermissions::PermissionId)
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_group_permissions_group")
                                .from(GroupPermissions::Table, GroupPermissions::GroupId)
                                .to(Groups::Table, Groups::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_group_permissions_permission")
                                .from(GroupPermissions::Table, GroupPermissions::PermissionId)
                                .to(Permissions::Table, Permissions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(UserPermissions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(UserPermissions::UserId).uuid().not_null())
                        .col(ColumnDef::new(UserPermissions::PermissionId).uuid().not_null())
                        .primary_key(
                            Index::create()
                                .col(UserPermissions::UserId)
                                .col(UserPermissions::PermissionId)
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_permissions_user")
                                .from(UserPermissions::Table, UserPermissions::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_user_permissions_permission")
                                .from(UserPermissions::Table, UserPermissions::PermissionId)
                                .to(Permissions::Table, Permissions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(UserPermissions::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(GroupPermissions::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(UserGroups::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Permissions::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Groups::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Username,
        Email,
        FirstName,
        LastName,
        PasswordHash,
        IsActive,
        IsSuperuser,
        LastLogin,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Groups {
        Table,
        Id,
        Name,
        Description,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Permissions {
        Table,
        Id,
        Codename,
        Name,
        Module,
    }

    #[derive(DeriveIden)]
    pub enum UserGroups {
        Table,
        UserId,
        GroupId,
    }

    #[derive(DeriveIden)]
    pub enum GroupPermissions {
        Table,
        GroupId,
        PermissionId,
    }

    #[derive(DeriveIden)]
    pub enum UserPermissions {
        Table,
        UserId,
        PermissionId,
    }
}

/// Creates organisational units and classification catalogs.
mod m20240101_000002_create_org_and_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_org_and_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrgUnits::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrgUnits::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrgUnits::Kind).string().not_null())
                        .col(ColumnDef::new(OrgUnits::Code).string().not_null())
                        .col(ColumnDef::new(OrgUnits::Name).string().not_null())
                        .col(ColumnDef::new(OrgUnits::Description).text().null())
                        .col(ColumnDef::new(OrgUnits::ResponsibleId).uuid().null())
                        .col(
                            ColumnDef::new(OrgUnits::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(OrgUnits::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(OrgUnits::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(OrgUnits::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_org_units_kind_code")
                        .table(OrgUnits::Table)
                        .col(OrgUnits::Kind)
                        .col(OrgUnits::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CatalogEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CatalogEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogEntries::Kind).string().not_null())
                        .col(ColumnDef::new(CatalogEntries::Code).string().not_null())
                        .col(ColumnDef::new(CatalogEntries::Name).string().not_null())
                        .col(ColumnDef::new(CatalogEntries::Description).text().null())
                        .col(
                            ColumnDef::new(CatalogEntries::RequiresApproval)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(CatalogEntries::RequiresOrder)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(CatalogEntries::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(CatalogEntries::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(CatalogEntries::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(CatalogEntries::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_catalog_entries_kind_code")
                        .table(CatalogEntries::Table)
                        .col(CatalogEntries::Kind)
                        .col(CatalogEntries::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CatalogEntries::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(OrgUnits::Table).if_exists().to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub enum OrgUnits {
        Table,
        Id,
        Kind,
        Code,
        Name,
        Description,
        ResponsibleId,
        Active,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum CatalogEntries {
        Table,
        Id,
        Kind,
        Code,
        Name,
        Description,
        RequiresApproval,
        RequiresOrder,
        Active,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }
}

/// Creates warehouses, articles, assets, stock movements and deliveries.
mod m20240101_000003_create_warehouse_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_warehouse_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::LocationId).uuid().null())
                        .col(ColumnDef::new(Warehouses::ManagerId).uuid().null())
                        .col(
                            ColumnDef::new(Warehouses::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Warehouses::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Warehouses::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Warehouses::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Articles::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Articles::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Articles::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Articles::Name).string().not_null())
                        .col(ColumnDef::new(Articles::Description).text().null())
                        .col(ColumnDef::new(Articles::CategoryId).uuid().null())
                        .col(ColumnDef::new(Articles::UnitId).uuid().null())
                        .col(ColumnDef::new(Articles::BrandId).uuid().null())
                        .col(ColumnDef::new(Articles::WarehouseId).uuid().null())
                        .col(
                            ColumnDef::new(Articles::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Articles::MinStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Articles::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Articles::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Articles::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Articles::UpdatedAt).timestamp_with_time_zone().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_articles_warehouse")
                                .from(Articles::Table, Articles::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_articles_category_id")
                        .table(Articles::Table)
                        .col(Articles::CategoryId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Assets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Assets::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Assets::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Assets::Name).string().not_null())
                        .col(ColumnDef::new(Assets::Description).text().null())
                        .col(ColumnDef::new(Assets::CategoryId).uuid().null())
                        .col(ColumnDef::new(Assets::SerialNumber).string().null())
                        .col(
                            ColumnDef::new(Assets::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Assets::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Assets::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Assets::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Movements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Movements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Movements::ArticleId).uuid().not_null())
                        .col(ColumnDef::new(Movements::MovementTypeId).uuid().null())
                        .col(ColumnDef::new(Movements::Operation).string().not_null())
                        .col(ColumnDef::new(Movements::Quantity).integer().not_null())
                        .col(ColumnDef::new(Movements::StockBefore).integer().not_null())
                        .col(ColumnDef::new(Movements::StockAfter).integer().not_null())
                        .col(ColumnDef::new(Movements::Reason).text().null())
                        .col(ColumnDef::new(Movements::ReferenceKind).string().null())
                        .col(ColumnDef::new(Movements::ReferenceId).uuid().null())
                        .col(ColumnDef::new(Movements::UserId).uuid().not_null())
                        .col(ColumnDef::new(Movements::CreatedAt).timestamp_with_time_zone().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_movements_article")
                                .from(Movements::Table, Movements::ArticleId)
                                .to(Articles::Table, Articles::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_movements_article_created")
                        .table(Movements::Table)
                        .col(Movements::ArticleId)
                        .col(Movements::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Deliveries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Deliveries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::Number)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Deliveries::Kind).string().not_null())
                        .col(ColumnDef::new(Deliveries::WarehouseId).uuid().null())
                        .col(ColumnDef::new(Deliveries::DeliveredBy).uuid().not_null())
                        .col(ColumnDef::new(Deliveries::ReceivedBy).uuid().null())
                        .col(ColumnDef::new(Deliveries::Reason).text().not_null())
                        .col(ColumnDef::new(Deliveries::DepartmentId).uuid().null())
                        .col(ColumnDef::new(Deliveries::Notes).text().null())
                        .col(ColumnDef::new(Deliveries::RequestId).uuid().null())
                        .col(ColumnDef::new(Deliveries::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryLines::DeliveryId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryLines::ArticleId).uuid().null())
                        .col(ColumnDef::new(DeliveryLines::AssetId).uuid().null())
                        .col(ColumnDef::new(DeliveryLines::Quantity).integer().not_null())
                        .col(ColumnDef::new(DeliveryLines::RequestDetailId).uuid().null())
                        .col(ColumnDef::new(DeliveryLines::Notes).text().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_lines_delivery")
                                .from(DeliveryLines::Table, DeliveryLines::DeliveryId)
                                .to(Deliveries::Table, Deliveries::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_lines_delivery_id")
                        .table(DeliveryLines::Table)
                        .col(DeliveryLines::DeliveryId)
                        .to_owned(),
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryLines::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Deliveries::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Movements::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Assets::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Articles::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Warehouses::Table).if_exists().to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub enum Warehouses {
        Table,
        Id,
        Code,
        Name,
        LocationId,
        ManagerId,
        Active,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Articles {
        Table,
        Id,
        Code,
        Name,
        Description,
        CategoryId,
        UnitId,
        BrandId,
        WarehouseId,
        Stock,
        MinStock,
        Active,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Assets {
        Table,
        Id,
        Code,
        Name,
        Description,
        CategoryId,
        SerialNumber,
        Active,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Movements {
        Table,
        Id,
        ArticleId,
        MovementTypeId,
        Operation,
        Quantity,
        StockBefore,
        StockAfter,
        Reason,
        ReferenceKind,
        ReferenceId,
        UserId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Deliveries {
        Table,
        Id,
        Number,
        Kind,
        WarehouseId,
        DeliveredBy,
        ReceivedBy,
        Reason,
        DepartmentId,
        Notes,
        RequestId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum DeliveryLines {
        Table,
        Id,
        DeliveryId,
        ArticleId,
        AssetId,
        Quantity,
        RequestDetailId,
        Notes,
    }
}

/// Creates suppliers, purchase orders and receptions.
mod m20240101_000004_create_procurement_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_procurement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Suppliers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::TaxId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Suppliers::BusinessName).string().not_null())
                        .col(ColumnDef::new(Suppliers::TradeName).string().null())
                        .col(ColumnDef::new(Suppliers::ContactName).string().null())
                        .col(ColumnDef::new(Suppliers::Email).string().null())
                        .col(ColumnDef::new(Suppliers::Phone).string().null())
                        .col(ColumnDef::new(Suppliers::Address).text().null())
                        .col(
                            ColumnDef::new(Suppliers::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Suppliers::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Suppliers::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Suppliers::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Number)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrders::WarehouseId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrders::Status).string().not_null())
                        .col(ColumnDef::new(PurchaseOrders::OrderDate).date().not_null())
                        .col(ColumnDef::new(PurchaseOrders::ExpectedDate).date().null())
                        .col(ColumnDef::new(PurchaseOrders::Notes).text().null())
                        .col(
                            ColumnDef::new(PurchaseOrders::Subtotal)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Tax)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Total)
                                .decimal_len(14, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PurchaseOrders::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(PurchaseOrders::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(PurchaseOrders::UpdatedAt).timestamp_with_time_zone().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_supplier")
                                .from(PurchaseOrders::Table, PurchaseOrders::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_status")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrderLines::PurchaseOrderId).uuid().not_null())
                        .col(ColumnDef::new(PurchaseOrderLines::ArticleId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrderLines::AssetId).uuid().null())
                        .col(ColumnDef::new(PurchaseOrderLines::Description).text().null())
                        .col(ColumnDef::new(PurchaseOrderLines::Quantity).integer().not_null())
                        .col(ColumnDef::new(PurchaseOrderLines::UnitPrice).decimal_len(14, 2).not_null())
                        .col(ColumnDef::new(PurchaseOrderLines::Subtotal).decimal_len(14, 2).not_null())
                        .col(
                            ColumnDef::new(PurchaseOrderLines::ReceivedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_order_lines_order")
                                .from(PurchaseOrderLines::Table, PurchaseOrderLines::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Receptions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Receptions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receptions::Number)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Receptions::Kind).string().not_null())
                        .col(ColumnDef::new(Receptions::PurchaseOrderId).uuid().null())
                        .col(ColumnDef::new(Receptions::ReceptionTypeId).uuid().null())
                        .col(ColumnDef::new(Receptions::WarehouseId).uuid().null())
                        .col(ColumnDef::new(Receptions::Status).string().not_null())
                        .col(ColumnDef::new(Receptions::ReceivedBy).uuid().not_null())
                        .col(ColumnDef::new(Receptions::Notes).text().null())
                        .col(ColumnDef::new(Receptions::ConfirmedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Receptions::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Receptions::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReceptionLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReceptionLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReceptionLines::ReceptionId).uuid().not_null())
                        .col(ColumnDef::new(ReceptionLines::PurchaseOrderLineId).uuid().null())
                        .col(ColumnDef::new(ReceptionLines::ArticleId).uuid().null())
                        .col(ColumnDef::new(ReceptionLines::AssetId).uuid().null())
                        .col(ColumnDef::new(ReceptionLines::Quantity).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_reception_lines_reception")
                                .from(ReceptionLines::Table, ReceptionLines::ReceptionId)
                                .to(Receptions::Table, Receptions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReceptionLines::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Receptions::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(PurchaseOrderLines::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Suppliers::Table).if_exists().to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub enum Suppliers {
        Table,
        Id,
        TaxId,
        BusinessName,
        TradeName,
        ContactName,
        Email,
        Phone,
        Address,
        Active,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum PurchaseOrders {
        Table,
        Id,
        Number,
        SupplierId,
        WarehouseId,
        Status,
        OrderDate,
        ExpectedDate,
        Notes,
        Subtotal,
        Tax,
        Total,
        CreatedBy,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum PurchaseOrderLines {
        Table,
        Id,
        PurchaseOrderId,
        ArticleId,
        AssetId,
        Description,
        Quantity,
        UnitPrice,
        Subtotal,
        ReceivedQuantity,
    }

    #[derive(DeriveIden)]
    pub enum Receptions {
        Table,
        Id,
        Number,
        Kind,
        PurchaseOrderId,
        ReceptionTypeId,
        WarehouseId,
        Status,
        ReceivedBy,
        Notes,
        ConfirmedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum ReceptionLines {
        Table,
        Id,
        ReceptionId,
        PurchaseOrderLineId,
        ArticleId,
        AssetId,
        Quantity,
    }
}

/// Creates internal requests, their lines and status history.
mod m20240101_000005_create_request_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_request_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Requests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Requests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Requests::Number)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Requests::RequestTypeId).uuid().not_null())
                        .col(ColumnDef::new(Requests::Kind).string().not_null())
                        .col(ColumnDef::new(Requests::Status).string().not_null())
                        .col(ColumnDef::new(Requests::RequesterId).uuid().not_null())
                        .col(ColumnDef::new(Requests::ApproverId).uuid().null())
                        .col(ColumnDef::new(Requests::RejectedBy).uuid().null())
                        .col(ColumnDef::new(Requests::DispatcherId).uuid().null())
                        .col(ColumnDef::new(Requests::RequestedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Requests::RequiredDate).date().null())
                        .col(ColumnDef::new(Requests::Reason).text().not_null())
                        .col(ColumnDef::new(Requests::RequestingArea).string().null())
                        .col(ColumnDef::new(Requests::ActivityTitle).string().null())
                        .col(ColumnDef::new(Requests::ActivityObjective).text().null())
                        .col(ColumnDef::new(Requests::WarehouseId).uuid().null())
                        .col(ColumnDef::new(Requests::DepartmentId).uuid().null())
                        .col(ColumnDef::new(Requests::AreaId).uuid().null())
                        .col(ColumnDef::new(Requests::Notes).text().null())
                        .col(ColumnDef::new(Requests::ApprovalNotes).text().null())
                        .col(ColumnDef::new(Requests::DispatchNotes).text().null())
                        .col(ColumnDef::new(Requests::RejectionReason).text().null())
                        .col(ColumnDef::new(Requests::ApprovedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Requests::RejectedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Requests::DispatchedAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Requests::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Requests::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Requests::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requests_status")
                        .table(Requests::Table)
                        .col(Requests::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requests_requester_id")
                        .table(Requests::Table)
                        .col(Requests::RequesterId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RequestDetails::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RequestDetails::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequestDetails::RequestId).uuid().not_null())
                        .col(ColumnDef::new(RequestDetails::ArticleId).uuid().null())
                        .col(ColumnDef::new(RequestDetails::AssetId).uuid().null())
                        .col(ColumnDef::new(RequestDetails::RequestedQuantity).integer().not_null())
                        .col(
                            ColumnDef::new(RequestDetails::ApprovedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RequestDetails::DispatchedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(RequestDetails::Notes).text().null())
                        .col(
                            ColumnDef::new(RequestDetails::Deleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_request_details_request")
                                .from(RequestDetails::Table, RequestDetails::RequestId)
                                .to(Requests::Table, Requests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RequestHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RequestHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequestHistory::RequestId).uuid().not_null())
                        .col(ColumnDef::new(RequestHistory::PreviousStatus).string().null())
                        .col(ColumnDef::new(RequestHistory::NewStatus).string().not_null())
                        .col(ColumnDef::new(RequestHistory::UserId).uuid().not_null())
                        .col(ColumnDef::new(RequestHistory::Note).text().null())
                        .col(ColumnDef::new(RequestHistory::CreatedAt).timestamp_with_time_zone().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_request_history_request")
                                .from(RequestHistory::Table, RequestHistory::RequestId)
                                .to(Requests::Table, Requests::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_request_history_request_id")
                        .table(RequestHistory::Table)
                        .col(RequestHistory::RequestId)
                        .to_owned(),
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RequestHistory::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(RequestDetails::Table).if_exists().to_owned())
                .await?;

            manager
                .drop_table(Table::drop().table(Requests::Table).if_exists().to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub enum Requests {
        Table,
        Id,
        Number,
        RequestTypeId,
        Kind,
        Status,
        RequesterId,
        ApproverId,
        RejectedBy,
        DispatcherId,
        RequestedAt,
        RequiredDate,
        Reason,
        RequestingArea,
        ActivityTitle,
        ActivityObjective,
        WarehouseId,
        DepartmentId,
        AreaId,
        Notes,
        ApprovalNotes,
        DispatchNotes,
        RejectionReason,
        ApprovedAt,
        RejectedAt,
        DispatchedAt,
        Deleted,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub enum RequestDetails {
        Table,
        Id,
        RequestId,
        ArticleId,
        AssetId,
        RequestedQuantity,
        ApprovedQuantity,
        DispatchedQuantity,
        Notes,
        Deleted,
    }

    #[derive(DeriveIden)]
    pub enum RequestHistory {
        Table,
        Id,
        RequestId,
        PreviousStatus,
        NewStatus,
        UserId,
        Note,
        CreatedAt,
    }
}

mod m20240101_000006_create_audit_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_audit_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditLogs::ActorId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                        .col(ColumnDef::new(AuditLogs::Entity).string().not_null())
                        .col(ColumnDef::new(AuditLogs::EntityId).uuid().null())
                        .col(ColumnDef::new(AuditLogs::Details).text().null())
                        .col(ColumnDef::new(AuditLogs::CreatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_logs_entity")
                        .table(AuditLogs::Table)
                        .col(AuditLogs::Entity)
                        .col(AuditLogs::EntityId)
                        .to_owned(),
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogs::Table).if_exists().to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    pub enum AuditLogs {
        Table,
        Id,
        ActorId,
        Action,
        Entity,
        EntityId,
        Details,
        CreatedAt,
    }
}
