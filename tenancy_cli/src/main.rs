//! `tenancy`: HTTP server and migration commands.
//!
//! ```text
//! tenancy serve
//! tenancy migrate shared
//! tenancy migrate tenant TOPSTEEL --create-database
//! tenancy migrate all-tenants
//! tenancy rollback tenant TOPSTEEL
//! tenancy status [--tenant TOPSTEEL]
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::net::TcpListener;
use topsteel_tenancy::migration::MigrationTarget;
use topsteel_tenancy::telemetry::init_tracing;
use topsteel_tenancy::{
    app_router, connect_shared, ensure_database_exists, AppState, ConnectionCache, PgConnectionFactory,
    PgTenantRegistry, Settings, TenantCode, TenantResolver,
};

#[derive(Parser)]
#[command(name = "tenancy", version, about = "TopSteel multi-tenant database routing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        /// Overrides BIND_ADDR
        #[arg(long, env = "BIND_ADDR")]
        bind: Option<String>,
    },
    /// Apply pending migrations (already applied ones are skipped)
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Revert the most recently applied migration
    Rollback {
        #[command(subcommand)]
        target: RollbackTarget,
    },
    /// Show executed and pending migrations
    Status {
        /// Only this tenant; default is the shared database and every active tenant
        #[arg(long)]
        tenant: Option<String>,
    },
    /// List active tenants
    Tenants,
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Shared (auth) database
    Shared,
    /// One tenant database
    Tenant {
        code: String,
        /// Create the tenant database first if it does not exist
        #[arg(long)]
        create_database: bool,
    },
    /// Every active tenant, stopping at the first failure
    AllTenants,
}

#[derive(Subcommand)]
enum RollbackTarget {
    Shared,
    Tenant { code: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("topsteel_tenancy=info,tenancy=info,tower_http=info");

    let cli = Cli::parse();
    let settings = Settings::from_env().context("reading settings")?;
    let state = build_state(settings).await?;

    let result = run(cli.command, &state).await;
    state.resolver.shutdown().await;
    result
}

async fn build_state(settings: Settings) -> anyhow::Result<AppState> {
    let shared_pool = connect_shared(&settings.database)
        .await
        .with_context(|| format!("connecting to shared database {}", settings.database.shared_database))?;
    let resolver = TenantResolver::new(
        Arc::new(PgTenantRegistry::new(shared_pool.clone())),
        Arc::new(PgConnectionFactory::new(settings.database.clone())),
        Arc::new(ConnectionCache::new()),
        settings.database.connect_timeout,
    );
    Ok(AppState {
        shared_pool,
        resolver: Arc::new(resolver),
        settings: Arc::new(settings),
    })
}

fn tenant_target(code: &str) -> anyhow::Result<MigrationTarget> {
    let code: TenantCode = code.parse()?;
    Ok(MigrationTarget::Tenant(code))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Command, state: &AppState) -> anyhow::Result<()> {
    let migrations = state.migrations();
    match command {
        Command::Serve { bind } => serve(state.clone(), bind).await?,
        Command::Migrate { target } => match target {
            MigrateTarget::Shared => print_json(&migrations.run(&MigrationTarget::Shared).await?)?,
            MigrateTarget::Tenant { code, create_database } => {
                let target = tenant_target(&code)?;
                if create_database {
                    if let MigrationTarget::Tenant(code) = &target {
                        let tenant = state.resolver.registry().find_by_code(code).await?;
                        ensure_database_exists(&state.settings.database, &tenant.database_name).await?;
                    }
                }
                print_json(&migrations.run(&target).await?)?
            }
            MigrateTarget::AllTenants => print_json(&migrations.run_all_tenants().await?)?,
        },
        Command::Rollback { target } => {
            let target = match target {
                RollbackTarget::Shared => MigrationTarget::Shared,
                RollbackTarget::Tenant { code } => tenant_target(&code)?,
            };
            match migrations.rollback(&target).await? {
                Some(record) => tracing::info!(migration = %record.name, version = record.version, "rolled back"),
                None => tracing::info!(migration_target = %target, "nothing to roll back"),
            }
        }
        Command::Status { tenant } => {
            let statuses = match tenant {
                Some(code) => vec![migrations.status(&tenant_target(&code)?).await?],
                None => migrations.status_all().await?,
            };
            print_json(&statuses)?
        }
        Command::Tenants => print_json(&state.resolver.registry().list_active().await?)?,
    }
    Ok(())
}

async fn serve(state: AppState, bind: Option<String>) -> anyhow::Result<()> {
    let addr = bind.unwrap_or_else(|| state.settings.bind_addr.clone());
    let app = app_router(state);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {}", addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;
    Ok(())
}
