//! Migrations for the shared database and for every tenant database.

use super::{Migration, MigrationSet};
use crate::error::MigrationError;

const CREATE_SOCIETES_UP: &str = r#"
CREATE TABLE societes (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    code VARCHAR(32) NOT NULL,
    nom VARCHAR(255) NOT NULL,
    database_name VARCHAR(63) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ,
    created_by UUID,
    updated_by UUID,
    deleted_by UUID,
    CONSTRAINT uq_societes_code UNIQUE (code),
    CONSTRAINT uq_societes_database_name UNIQUE (database_name),
    CONSTRAINT chk_societes_code CHECK (code ~ '^[A-Z0-9_]{1,32}$')
);
CREATE INDEX idx_societes_active ON societes (code) WHERE deleted_at IS NULL;
"#;

const CREATE_SOCIETES_DOWN: &str = "DROP TABLE IF EXISTS societes;";

const ADD_SOCIETE_CONFIGURATION_UP: &str = r#"
ALTER TABLE societes ADD COLUMN configuration JSONB NOT NULL DEFAULT '{"version": 1}'::jsonb;
"#;

const ADD_SOCIETE_CONFIGURATION_DOWN: &str = "ALTER TABLE societes DROP COLUMN IF EXISTS configuration;";

const LOCK_SOCIETE_CODE_UP: &str = r#"
CREATE OR REPLACE FUNCTION societes_code_immutable() RETURNS trigger AS $$
BEGIN
    IF NEW.code <> OLD.code THEN
        RAISE EXCEPTION 'societe code is immutable (%)', OLD.code;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_societes_code_immutable
    BEFORE UPDATE OF code ON societes
    FOR EACH ROW EXECUTE FUNCTION societes_code_immutable();
"#;

const LOCK_SOCIETE_CODE_DOWN: &str = r#"
DROP TRIGGER IF EXISTS trg_societes_code_immutable ON societes;
DROP FUNCTION IF EXISTS societes_code_immutable();
"#;

/// Shared (auth) database: the tenant registry.
pub fn shared_migrations() -> Result<MigrationSet, MigrationError> {
    MigrationSet::new(vec![
        Migration::new(1737000001000, "CreateSocietes", CREATE_SOCIETES_UP, CREATE_SOCIETES_DOWN),
        Migration::new(
            1737000002000,
            "AddSocieteConfiguration",
            ADD_SOCIETE_CONFIGURATION_UP,
            ADD_SOCIETE_CONFIGURATION_DOWN,
        ),
        Migration::new(1737000003000, "LockSocieteCode", LOCK_SOCIETE_CODE_UP, LOCK_SOCIETE_CODE_DOWN),
    ])
}

const CREATE_SYSTEM_PARAMETERS_UP: &str = r#"
CREATE TABLE system_parameters (
    key VARCHAR(100) PRIMARY KEY,
    value JSONB NOT NULL,
    category VARCHAR(50) NOT NULL DEFAULT 'general',
    description TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_by UUID
);
"#;

const CREATE_SYSTEM_PARAMETERS_DOWN: &str = "DROP TABLE IF EXISTS system_parameters;";

const CREATE_ARTICLES_UP: &str = r#"
CREATE TABLE articles (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    reference VARCHAR(50) NOT NULL,
    designation VARCHAR(255) NOT NULL,
    famille VARCHAR(100),
    unite_stock VARCHAR(10) NOT NULL DEFAULT 'PCS',
    prix_achat_standard NUMERIC(12, 4),
    stock_physique NUMERIC(12, 3) NOT NULL DEFAULT 0,
    is_marketplace_enabled BOOLEAN NOT NULL DEFAULT FALSE,
    marketplace_settings JSONB,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    deleted_at TIMESTAMPTZ,
    CONSTRAINT uq_articles_reference UNIQUE (reference)
);
"#;

const CREATE_ARTICLES_DOWN: &str = "DROP TABLE IF EXISTS articles;";

const INDEX_ARTICLES_FAMILLE_UP: &str =
    "CREATE INDEX CONCURRENTLY IF NOT EXISTS idx_articles_famille ON articles (famille) WHERE deleted_at IS NULL;";

const INDEX_ARTICLES_FAMILLE_DOWN: &str = "DROP INDEX CONCURRENTLY IF EXISTS idx_articles_famille;";

/// Applied to each tenant database independently.
pub fn tenant_migrations() -> Result<MigrationSet, MigrationError> {
    MigrationSet::new(vec![
        Migration::new(
            1737100001000,
            "CreateSystemParameters",
            CREATE_SYSTEM_PARAMETERS_UP,
            CREATE_SYSTEM_PARAMETERS_DOWN,
        ),
        Migration::new(1737100002000, "CreateArticles", CREATE_ARTICLES_UP, CREATE_ARTICLES_DOWN),
        Migration::new(
            1737100003000,
            "IndexArticlesFamille",
            INDEX_ARTICLES_FAMILLE_UP,
            INDEX_ARTICLES_FAMILLE_DOWN,
        )
        .non_transactional(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_are_strictly_ordered() {
        assert_eq!(shared_migrations().unwrap().len(), 3);
        assert_eq!(tenant_migrations().unwrap().len(), 3);
    }

    #[test]
    fn concurrent_index_runs_outside_a_transaction() {
        let set = tenant_migrations().unwrap();
        for m in set.iter() {
            assert_eq!(m.transactional, !m.up.contains("CONCURRENTLY"), "{}", m.label());
        }
    }
}
