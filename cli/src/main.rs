mod render;
mod store;
mod transport;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use estimator_core::{
    App, BuildingType, CacheKey, ClientConfig, Confirm, Credentials, Event, Id, Material, Project,
    Registration, Resource, Transport,
};
use tracing::Level;

use store::FileStore;
use transport::UreqTransport;

#[derive(Parser)]
#[command(name = "estimator")]
#[command(about = "Manage building types, materials and projects, and estimate project costs")]
struct Cli {
    /// Base URL of the API, including the `/api` prefix
    #[arg(long, env = estimator_core::config::API_URL_ENV, value_name = "URL")]
    api_url: Option<String>,

    /// Session file holding the bearer token
    #[arg(long, env = "ESTIMATOR_SESSION", value_name = "FILE")]
    session: Option<PathBuf>,

    /// Log requests and cache activity to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and store the session token
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },
    /// Forget the stored session token
    Logout,
    /// Show how many records each collection holds
    Dashboard,
    /// List all records of a resource
    List {
        /// building-types, materials or projects
        resource: CacheKey,
    },
    /// Fetch a single record
    Show { resource: CacheKey, id: Id },
    /// Create a record from `--set field=value` pairs
    Create {
        resource: CacheKey,
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Change fields of an existing record
    Edit {
        resource: CacheKey,
        id: Id,
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },
    /// Delete a record after confirmation
    Delete {
        resource: CacheKey,
        id: Id,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Ask the backend to estimate a project's cost
    Estimate { id: Id },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field.to_string(), value.to_string()))
}

/// Asks on stdout and reads y/N from stdin.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, message: &str) -> bool {
        print!("{message} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

type EstimatorApp = App<FileStore>;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let config = match &cli.api_url {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::from_env(),
    };
    let session = FileStore::open(cli.session.clone().unwrap_or_else(store::default_path));
    tracing::debug!(api = %config.base_url, session = %session.path().display(), "starting");

    let mut app = App::new(config, session);
    let mut transport = UreqTransport::new();
    run(cli.command, &mut app, &mut transport, &mut StdinConfirm)
}

/// `confirm` answers delete prompts unless `--yes` was given.
fn run(
    command: Command,
    app: &mut EstimatorApp,
    transport: &mut UreqTransport,
    confirm: &mut dyn Confirm,
) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            app.login(&Credentials { email, password })?;
            authenticate(app, transport)
        }
        Command::Register {
            email,
            password,
            name,
        } => {
            app.register(&Registration {
                email,
                password,
                name,
            })?;
            authenticate(app, transport)
        }
        Command::Logout => {
            app.logout()?;
            println!("Logged out");
            Ok(())
        }
        Command::Dashboard => {
            app.dashboard();
            app.run_until_idle(transport);
            print!("{}", render::dashboard(&app.dashboard()));
            Ok(())
        }
        Command::List { resource } => match resource {
            CacheKey::BuildingTypes => list::<BuildingType>(app, transport),
            CacheKey::Materials => list::<Material>(app, transport),
            CacheKey::Projects => list::<Project>(app, transport),
        },
        Command::Show { resource, id } => match resource {
            CacheKey::BuildingTypes => show::<BuildingType>(app, transport, &id),
            CacheKey::Materials => show::<Material>(app, transport, &id),
            CacheKey::Projects => show::<Project>(app, transport, &id),
        },
        Command::Create { resource, set } => match resource {
            CacheKey::BuildingTypes => create::<BuildingType>(app, transport, &set),
            CacheKey::Materials => create::<Material>(app, transport, &set),
            CacheKey::Projects => create::<Project>(app, transport, &set),
        },
        Command::Edit { resource, id, set } => match resource {
            CacheKey::BuildingTypes => edit::<BuildingType>(app, transport, &id, &set),
            CacheKey::Materials => edit::<Material>(app, transport, &id, &set),
            CacheKey::Projects => edit::<Project>(app, transport, &id, &set),
        },
        Command::Delete { resource, id, yes } => {
            let mut always = |_: &str| true;
            let confirm: &mut dyn Confirm = if yes { &mut always } else { confirm };
            match resource {
                CacheKey::BuildingTypes => delete::<BuildingType>(app, transport, &id, confirm),
                CacheKey::Materials => delete::<Material>(app, transport, &id, confirm),
                CacheKey::Projects => delete::<Project>(app, transport, &id, confirm),
            }
        }
        Command::Estimate { id } => estimate(app, transport, &id),
    }
}

fn authenticate(app: &mut EstimatorApp, transport: &mut UreqTransport) -> anyhow::Result<()> {
    app.run_until_idle(transport);
    for event in app.take_events() {
        match event {
            Event::Authenticated(auth) => {
                match auth.user {
                    Some(user) => println!("Logged in as {} <{}>", user.name, user.email),
                    None => println!("Logged in"),
                }
                return Ok(());
            }
            Event::AuthFailed(error) => bail!("authentication failed: {error}"),
            Event::SessionFailed(error) => bail!("logged in, but {error}"),
            _ => {}
        }
    }
    bail!("no response from the auth endpoint")
}

fn list<R: Resource>(app: &mut EstimatorApp, transport: &mut UreqTransport) -> anyhow::Result<()> {
    app.view::<R>();
    app.run_until_idle(transport);
    let view = app.view::<R>();
    print!("{}", render::screen(&view));
    if let Some(error) = view.error {
        bail!("could not load {}: {error}", R::HEADING.to_lowercase());
    }
    Ok(())
}

fn show<R: Resource>(app: &mut EstimatorApp, transport: &mut UreqTransport, id: &Id) -> anyhow::Result<()> {
    let client = app.client();
    let mut request = client.build_get::<R>(id);
    client.authorize(&mut request, app.session());
    let response = transport
        .execute(&request)
        .with_context(|| format!("fetching {} {id}", R::NOUN))?;
    let record = client
        .parse_record::<R>(response)
        .with_context(|| format!("fetching {} {id}", R::NOUN))?;
    print!("{}", render::card(&record.card()));
    Ok(())
}

/// Apply `--set` pairs to the open dialog; with none given, print the form.
fn fill<R: Resource>(
    app: &mut EstimatorApp,
    transport: &mut UreqTransport,
    set: &[(String, String)],
) -> anyhow::Result<()> {
    if set.is_empty() {
        app.view::<R>();
        app.run_until_idle(transport);
        if let Some(dialog) = app.view::<R>().dialog {
            print!("{}", render::dialog(&dialog));
        }
        app.close_dialog::<R>()?;
        bail!("nothing to save; pass one or more --set FIELD=VALUE");
    }
    for (field, value) in set {
        app.set_field::<R>(field, value)
            .with_context(|| format!("setting {field}"))?;
    }
    Ok(())
}

fn save<R: Resource>(app: &mut EstimatorApp, transport: &mut UreqTransport) -> anyhow::Result<()> {
    app.submit::<R>()?;
    app.run_until_idle(transport);
    for event in app.take_events() {
        match event {
            Event::Saved { id, .. } => {
                println!("Saved {} {id}", R::NOUN);
                return Ok(());
            }
            Event::SaveFailed { error, .. } => bail!("saving {} failed: {error}", R::NOUN),
            _ => {}
        }
    }
    bail!("no response to the save request")
}

fn create<R: Resource>(
    app: &mut EstimatorApp,
    transport: &mut UreqTransport,
    set: &[(String, String)],
) -> anyhow::Result<()> {
    app.open_create::<R>()?;
    fill::<R>(app, transport, set)?;
    save::<R>(app, transport)
}

fn edit<R: Resource>(
    app: &mut EstimatorApp,
    transport: &mut UreqTransport,
    id: &Id,
    set: &[(String, String)],
) -> anyhow::Result<()> {
    app.view::<R>();
    app.run_until_idle(transport);
    app.open_edit::<R>(id)
        .with_context(|| format!("no {} with id {id}", R::NOUN))?;
    fill::<R>(app, transport, set)?;
    save::<R>(app, transport)
}

fn delete<R: Resource>(
    app: &mut EstimatorApp,
    transport: &mut UreqTransport,
    id: &Id,
    confirm: &mut dyn Confirm,
) -> anyhow::Result<()> {
    if !app.delete::<R, _>(id, confirm)? {
        println!("Cancelled");
        return Ok(());
    }
    app.run_until_idle(transport);
    for event in app.take_events() {
        match event {
            Event::Deleted { id, .. } => {
                println!("Deleted {} {id}", R::NOUN);
                return Ok(());
            }
            Event::DeleteFailed { error, .. } => bail!("deleting {} failed: {error}", R::NOUN),
            _ => {}
        }
    }
    bail!("no response to the delete request")
}

fn estimate(app: &mut EstimatorApp, transport: &mut UreqTransport, id: &Id) -> anyhow::Result<()> {
    app.estimate(id)?;
    app.run_until_idle(transport);
    for event in app.take_events() {
        match event {
            Event::Estimated(project) => {
                print!("{}", render::card(&project.card()));
                return Ok(());
            }
            Event::EstimateFailed { error, .. } => bail!("estimate failed: {error}"),
            _ => {}
        }
    }
    bail!("no response to the estimate request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use estimator_core::SessionStore;
    use tempdir::TempDir;

    #[test]
    fn assignment_splits_on_first_equals() {
        assert_eq!(
            parse_assignment("estimationFormula=area * 1200 = base").unwrap(),
            ("estimationFormula".to_string(), "area * 1200 = base".to_string())
        );
        assert_eq!(
            parse_assignment("description=").unwrap(),
            ("description".to_string(), String::new())
        );
    }

    #[test]
    fn assignment_requires_a_field() {
        assert!(parse_assignment("no-equals").is_err());
        assert!(parse_assignment("=value").is_err());
    }

    #[test]
    fn resource_accepts_both_spellings() {
        let cli = Cli::try_parse_from(["estimator", "list", "building-types"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List {
                resource: CacheKey::BuildingTypes
            }
        ));
        let cli = Cli::try_parse_from(["estimator", "list", "buildingTypes"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List {
                resource: CacheKey::BuildingTypes
            }
        ));
        assert!(Cli::try_parse_from(["estimator", "list", "walls"]).is_err());
    }

    #[test]
    fn create_collects_repeated_sets() {
        let cli = Cli::try_parse_from([
            "estimator",
            "create",
            "materials",
            "--set",
            "name=Cement",
            "--set",
            "pricePerUnit=12.5",
        ])
        .unwrap();
        let Command::Create { resource, set } = cli.command else {
            panic!("expected create");
        };
        assert_eq!(resource, CacheKey::Materials);
        assert_eq!(set.len(), 2);
        assert_eq!(set[1], ("pricePerUnit".to_string(), "12.5".to_string()));
    }

    #[test]
    fn delete_yes_flag() {
        let cli = Cli::try_parse_from(["estimator", "delete", "projects", "42", "--yes"]).unwrap();
        let Command::Delete { id, yes, .. } = cli.command else {
            panic!("expected delete");
        };
        assert!(yes);
        assert_eq!(id, Id::from("42"));
    }

    // -- commands against a live mock server ---------------------------------

    fn start_server() -> String {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
            .unwrap();
        });

        format!("http://{addr}/api")
    }

    /// A CLI pointed at a fresh mock server. Delete prompts are declined.
    struct Harness {
        app: EstimatorApp,
        transport: UreqTransport,
        _dir: TempDir,
    }

    impl Harness {
        fn new(session: impl FnOnce(&std::path::Path) -> PathBuf) -> Self {
            let dir = TempDir::new("estimator").unwrap();
            let store = FileStore::open(session(dir.path()));
            Self {
                app: App::new(ClientConfig::new(&start_server()), store),
                transport: UreqTransport::new(),
                _dir: dir,
            }
        }

        fn exec(&mut self, args: &[&str]) -> anyhow::Result<()> {
            let argv = std::iter::once("estimator").chain(args.iter().copied());
            let cli = Cli::try_parse_from(argv).unwrap();
            run(cli.command, &mut self.app, &mut self.transport, &mut |_: &str| false)
        }

        fn only_id<R: Resource>(&self) -> String {
            let records = self.app.cache().collection::<R>().data().unwrap();
            assert_eq!(records.len(), 1);
            records[0].id().to_string()
        }

        fn saved_token(&self) -> Option<String> {
            FileStore::open(self.app.session().path()).load("token")
        }
    }

    #[test]
    fn commands_drive_the_api() {
        let mut h = Harness::new(|dir| dir.join("session.json"));

        h.exec(&["register", "--email", "ana@example.com", "--password", "pw", "--name", "Ana"])
            .unwrap();
        assert!(h.saved_token().is_some());

        // Without --set the form is shown and nothing is sent.
        let err = h.exec(&["create", "materials"]).unwrap_err();
        assert!(err.to_string().contains("nothing to save"), "{err}");
        assert!(!h.app.screen::<Material>().state().is_dialog_open());

        h.exec(&[
            "create",
            "materials",
            "--set",
            "name=Cement",
            "--set",
            "unit=bag",
            "--set",
            "pricePerUnit=12.5",
        ])
        .unwrap();
        h.exec(&["list", "materials"]).unwrap();
        let material = h.only_id::<Material>();

        h.exec(&["edit", "materials", material.as_str(), "--set", "pricePerUnit=13"])
            .unwrap();
        h.exec(&["show", "materials", material.as_str()]).unwrap();
        let stored = h.app.cache().collection::<Material>().data().unwrap()[0].clone();
        assert_eq!(stored.price_per_unit, 13.0);

        // Declining the prompt keeps the record.
        h.exec(&["delete", "materials", material.as_str()]).unwrap();
        h.exec(&["list", "materials"]).unwrap();
        assert_eq!(h.only_id::<Material>(), material);

        h.exec(&["delete", "materials", material.as_str(), "--yes"]).unwrap();
        h.exec(&["list", "materials"]).unwrap();
        assert!(h.app.cache().collection::<Material>().data().unwrap().is_empty());

        let err = h
            .exec(&["delete", "materials", material.as_str(), "--yes"])
            .unwrap_err();
        assert!(err.to_string().contains("resource not found"), "{err}");

        h.exec(&[
            "create",
            "building-types",
            "--set",
            "name=Warehouse",
            "--set",
            "estimationFormula=area * 1200",
        ])
        .unwrap();
        h.exec(&["list", "building-types"]).unwrap();
        let building_type = format!("buildingTypeId={}", h.only_id::<BuildingType>());

        h.exec(&[
            "create",
            "projects",
            "--set",
            "name=Warehouse A",
            "--set",
            building_type.as_str(),
            "--set",
            "area=500",
        ])
        .unwrap();
        h.exec(&["list", "projects"]).unwrap();
        let project = h.only_id::<Project>();

        h.exec(&["estimate", project.as_str()]).unwrap();
        let estimated = h.app.cache().collection::<Project>().data().unwrap()[0].clone();
        assert_eq!(estimated.estimated_cost, Some(600_000.0));
        assert!(h.exec(&["estimate", "no-such-project"]).is_err());

        h.exec(&["dashboard"]).unwrap();
        h.exec(&["logout"]).unwrap();
        assert_eq!(h.saved_token(), None);
    }

    #[test]
    fn login_fails_when_the_session_cannot_be_saved() {
        let mut h = Harness::new(|dir| {
            let blocker = dir.join("blocker");
            std::fs::write(&blocker, "a regular file").unwrap();
            blocker.join("session.json")
        });

        let err = h
            .exec(&["register", "--email", "ana@example.com", "--password", "pw", "--name", "Ana"])
            .unwrap_err();
        assert!(err.to_string().contains("failed to save session"), "{err}");
        assert!(!h.app.is_authenticated());
    }
}
