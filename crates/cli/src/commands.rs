use std::{path::PathBuf, str::FromStr, sync::Arc};

use api_types::{
    document::DocumentKind,
    expense::{ExpenseCategory, ExpenseRecord},
    person::Person,
};
use clap::{Args, Subcommand};
use engine::{
    AttachmentItem, DocumentCache, ExpenseEditor, ExpenseFilter, ExpenseForm, ExpenseService,
    Session, YearListing, attachments::local_display_name, settings::ConnectionConfig,
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    export,
};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store the connection settings and connect with them.
    Configure(ConfigureArgs),
    /// Show whether the service is reachable.
    Status,
    Persons(Persons),
    /// List the expenses of a year, newest first.
    List(ListArgs),
    Show {
        id: Uuid,
        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },
    Add(AddArgs),
    Edit(EditArgs),
    /// Fetch document `index` (as numbered by `show`) and print its local path.
    Open {
        id: Uuid,
        index: usize,
    },
    /// Re-run the server compliance rules for a year.
    Check {
        #[arg(long)]
        year: String,
    },
}

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    host: String,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    database: Option<String>,
    #[arg(long)]
    user: Option<String>,
    #[arg(long, env = "TAXREPORT_DB_PASSWORD")]
    password: Option<String>,
    #[arg(long)]
    share: Option<String>,
    #[arg(long)]
    share_user: Option<String>,
    #[arg(long, env = "TAXREPORT_SHARE_PASSWORD")]
    share_password: Option<String>,
}

#[derive(Args, Debug)]
pub struct Persons {
    #[command(subcommand)]
    command: PersonsCommand,
}

#[derive(Subcommand, Debug)]
enum PersonsCommand {
    List,
    Add { name: String },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long)]
    year: String,
    /// Person name or id, repeatable.
    #[arg(long = "person")]
    persons: Vec<String>,
    #[arg(long = "category")]
    categories: Vec<ExpenseCategory>,
    /// Write the listing as CSV to this file (`-` for stdout).
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct FormArgs {
    /// Person name or id.
    #[arg(long)]
    person: Option<String>,
    #[arg(long)]
    year: Option<String>,
    /// Date as dd/MM/yyyy.
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    category: Option<ExpenseCategory>,
    #[arg(long)]
    description: Option<String>,
    /// Document to upload as KIND:PATH, repeatable.
    #[arg(long = "attach")]
    attachments: Vec<AttachArg>,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[command(flatten)]
    form: FormArgs,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    id: Uuid,
    /// Document to drop, as numbered by `show`. Repeatable.
    #[arg(long = "remove")]
    remove: Vec<usize>,
    #[command(flatten)]
    form: FormArgs,
}

/// A `KIND:PATH` pair given on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachArg {
    kind: DocumentKind,
    path: PathBuf,
}

impl FromStr for AttachArg {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, path) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected KIND:PATH, got {raw}"))?;
        let kind = kind.parse::<DocumentKind>().map_err(|err| err.to_string())?;
        if path.trim().is_empty() {
            return Err(format!("missing path in {raw}"));
        }
        Ok(Self {
            kind,
            path: PathBuf::from(path),
        })
    }
}

pub async fn run(command: Command, session: &Session, cache: &DocumentCache) -> Result<()> {
    match command {
        Command::Configure(args) => configure(session, args).await,
        Command::Status => status(session).await,
        Command::Persons(persons) => {
            let service = connect(session).await?;
            match persons.command {
                PersonsCommand::List => {
                    for person in service.find_persons().await? {
                        println!("{}  {}", person.id, person.name);
                    }
                    Ok(())
                }
                PersonsCommand::Add { name } => {
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(AppError::Usage("person name is empty".to_string()));
                    }
                    let person = Person::new(name);
                    service.register_person(&person).await?;
                    println!("{}  {}", person.id, person.name);
                    Ok(())
                }
            }
        }
        Command::List(args) => list(session, args).await,
        Command::Show { id, json } => {
            let service = connect(session).await?;
            let editor = ExpenseEditor::load(service.as_ref(), id).await?;
            if let Some(record) = editor.original() {
                if json {
                    println!("{}", serde_json::to_string_pretty(record)?);
                    return Ok(());
                }
                print_record(record);
            }
            print_attachments(&editor);
            Ok(())
        }
        Command::Add(args) => {
            let service = connect(session).await?;
            let persons = service.find_persons().await?;
            let mut editor = ExpenseEditor::new();
            let mut form = ExpenseForm::default();
            args.form.apply(&persons, &mut form, &mut editor)?;
            print_attachments(&editor);
            let saved = editor.save(service.as_ref(), &form).await?;
            println!("saved {}", saved.id);
            Ok(())
        }
        Command::Edit(args) => edit(session, args).await,
        Command::Open { id, index } => {
            let service = connect(session).await?;
            let editor = ExpenseEditor::load(service.as_ref(), id).await?;
            let key = nth_item(&editor, index)?.key();
            let local = editor.open(service.as_ref(), cache, &key).await?;
            println!("{} ({})", local.path.display(), local.mime_type);
            Ok(())
        }
        Command::Check { year } => {
            let service = connect(session).await?;
            let mut listing = YearListing::load(service.as_ref(), &year).await?;
            listing.recheck(service.as_ref()).await?;
            let summary = listing.summary();
            println!(
                "{year}: {} completed, {} pending",
                summary.completed, summary.pending
            );
            Ok(())
        }
    }
}

async fn connect(session: &Session) -> Result<Arc<dyn ExpenseService>> {
    if !session.init().await? {
        return Err(AppError::Usage(
            "no connection configured, run `taxreport configure HOST` first".to_string(),
        ));
    }
    Ok(session.service().await?)
}

async fn configure(session: &Session, args: ConfigureArgs) -> Result<()> {
    let mut config = session
        .store()
        .connection()
        .await?
        .unwrap_or_else(|| ConnectionConfig::with_host(&args.host));
    config.host = args.host.trim().to_string();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(user) = args.user {
        config.username = user;
    }
    if let Some(password) = args.password {
        config.password = password;
    }
    if let Some(share) = args.share {
        config.share = share;
    }
    if let Some(share_user) = args.share_user {
        config.share_username = share_user;
    }
    if let Some(share_password) = args.share_password {
        config.share_password = share_password;
    }

    let connected = session.reconfigure(&config).await?;
    println!("settings written to {}", session.store().path().display());
    if connected {
        println!("connected to {}:{}", config.host, config.port);
    } else {
        println!("settings saved, no host configured");
    }
    Ok(())
}

async fn status(session: &Session) -> Result<()> {
    let Some(config) = session.store().connection().await? else {
        println!(
            "not configured, no host in {}",
            session.store().path().display()
        );
        return Ok(());
    };
    match session.init().await {
        Ok(_) => println!("connected to {}:{}", config.host, config.port),
        Err(err) => {
            tracing::warn!("connection check failed: {err}");
            println!("cannot reach {}:{}: {err}", config.host, config.port);
        }
    }
    Ok(())
}

async fn list(session: &Session, args: ListArgs) -> Result<()> {
    let service = connect(session).await?;
    let listing = YearListing::load(service.as_ref(), &args.year).await?;

    let mut filter = ExpenseFilter::new().with_categories(args.categories);
    if !args.persons.is_empty() {
        let known = service.find_persons().await?;
        let ids = args
            .persons
            .iter()
            .map(|wanted| find_person(&known, wanted).map(|p| p.id))
            .collect::<Result<Vec<_>>>()?;
        filter = filter.with_persons(ids);
    }
    tracing::debug!(
        persons = filter.persons().len(),
        categories = filter.categories().len(),
        unfiltered = filter.is_empty(),
        "listing filter"
    );
    let visible = listing.visible(&filter);

    match args.csv {
        Some(path) if path.as_os_str() == "-" => {
            export::write_csv(std::io::stdout().lock(), visible)?;
        }
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            export::write_csv(file, visible.iter().copied())?;
            tracing::info!(path = %path.display(), rows = visible.len(), "listing exported");
        }
        None => {
            for record in &visible {
                print_record(record);
            }
            let summary = listing.summary();
            println!(
                "{} shown, {} completed, {} pending",
                visible.len(),
                summary.completed,
                summary.pending
            );
        }
    }
    Ok(())
}

async fn edit(session: &Session, args: EditArgs) -> Result<()> {
    let service = connect(session).await?;
    let persons = service.find_persons().await?;
    let mut editor = ExpenseEditor::load(service.as_ref(), args.id).await?;
    let mut form = editor.form(&persons);

    let removed = args
        .remove
        .iter()
        .map(|index| nth_item(&editor, *index).map(AttachmentItem::key))
        .collect::<Result<Vec<_>>>()?;
    for key in &removed {
        editor.attachments_mut().remove(key);
    }
    args.form.apply(&persons, &mut form, &mut editor)?;
    print_attachments(&editor);

    let saved = editor.save(service.as_ref(), &form).await?;
    println!("saved {}", saved.id);
    Ok(())
}

impl FormArgs {
    /// Copies the given flags over `form` and queues the attachments.
    fn apply(
        self,
        persons: &[Person],
        form: &mut ExpenseForm,
        editor: &mut ExpenseEditor,
    ) -> Result<()> {
        if let Some(wanted) = &self.person {
            form.person = Some(find_person(persons, wanted)?.clone());
        }
        if let Some(year) = self.year {
            form.year = year;
        }
        if let Some(date) = self.date {
            form.raw_date = date;
        }
        if let Some(category) = self.category {
            form.category = category;
        }
        if let Some(description) = self.description {
            form.description = description;
        }

        for attach in self.attachments {
            let name = local_display_name(&attach.path);
            if !editor
                .attachments_mut()
                .add_pending(&attach.path, name.as_deref(), attach.kind)
            {
                tracing::warn!(path = %attach.path.display(), "attachment given twice");
            }
        }
        Ok(())
    }
}

fn find_person<'a>(persons: &'a [Person], wanted: &str) -> Result<&'a Person> {
    let wanted = wanted.trim();
    let by_id = Uuid::parse_str(wanted).ok();
    persons
        .iter()
        .find(|p| Some(p.id) == by_id || p.name.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| AppError::Usage(format!("unknown person {wanted}")))
}

fn nth_item(editor: &ExpenseEditor, index: usize) -> Result<&AttachmentItem> {
    index
        .checked_sub(1)
        .and_then(|i| editor.attachments().items().get(i))
        .ok_or_else(|| AppError::Usage(format!("no document number {index}")))
}

fn print_attachments(editor: &ExpenseEditor) {
    for (index, item) in editor.attachments().items().iter().enumerate() {
        let origin = if item.is_stored() { "stored" } else { "upload" };
        println!(
            "  [{}] {:<8} {} {}",
            index + 1,
            origin,
            item.kind(),
            item.display_name()
        );
    }
}

fn print_record(record: &ExpenseRecord) {
    println!(
        "{}  {:<10} {:<12} {:<18} {:<10} {}",
        record.id,
        record.raw_date.as_deref().unwrap_or("-"),
        record.person.name,
        record.category.as_str(),
        record.state.as_str(),
        record.description.as_deref().unwrap_or_default()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persons() -> Vec<Person> {
        vec![
            Person {
                id: Uuid::from_u128(1),
                name: "Anna".to_string(),
            },
            Person {
                id: Uuid::from_u128(2),
                name: "Luca".to_string(),
            },
        ]
    }

    #[test]
    fn attach_arg_parses_kind_and_path() {
        let arg: AttachArg = "scontrino:/tmp/a:b.jpg".parse().unwrap();
        assert_eq!(arg.kind, DocumentKind::Scontrino);
        assert_eq!(arg.path, PathBuf::from("/tmp/a:b.jpg"));

        assert!("fattura".parse::<AttachArg>().is_err());
        assert!("bolletta:/tmp/x.pdf".parse::<AttachArg>().is_err());
        assert!("fattura: ".parse::<AttachArg>().is_err());
    }

    #[test]
    fn persons_match_by_name_or_id() {
        let persons = persons();
        assert_eq!(find_person(&persons, "anna").unwrap().id, Uuid::from_u128(1));
        assert_eq!(
            find_person(&persons, &Uuid::from_u128(2).to_string())
                .unwrap()
                .name,
            "Luca"
        );
        assert!(find_person(&persons, "Marco").is_err());
    }

    #[test]
    fn form_flags_override_and_queue_uploads() {
        let persons = persons();
        let mut editor = ExpenseEditor::new();
        let mut form = ExpenseForm::default();
        let args = FormArgs {
            person: Some("Luca".to_string()),
            year: Some("2024".to_string()),
            category: Some(ExpenseCategory::Dentista),
            description: Some("pulizia".to_string()),
            attachments: vec![
                "fattura:/tmp/f.pdf".parse().unwrap(),
                "fattura:/tmp/f.pdf".parse().unwrap(),
            ],
            ..FormArgs::default()
        };

        args.apply(&persons, &mut form, &mut editor).unwrap();

        assert_eq!(form.person.as_ref().map(|p| p.name.as_str()), Some("Luca"));
        assert_eq!(form.year, "2024");
        assert_eq!(form.raw_date, "");
        assert_eq!(editor.attachments().len(), 1);
        assert_eq!(editor.attachments().items()[0].display_name(), "f.pdf");
    }

    #[derive(clap::Parser)]
    struct Harness {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn show_accepts_json_output() {
        use clap::Parser;

        let id = Uuid::from_u128(7);
        let parsed =
            Harness::try_parse_from(["taxreport", "show", &id.to_string(), "--json"]).unwrap();
        assert!(matches!(parsed.command, Command::Show { id: got, json: true } if got == id));

        let parsed = Harness::try_parse_from(["taxreport", "show", &id.to_string()]).unwrap();
        assert!(matches!(parsed.command, Command::Show { json: false, .. }));
    }

    #[test]
    fn json_failures_surface_as_json_errors() {
        let err: AppError = serde_json::from_str::<ExpenseRecord>("{").unwrap_err().into();
        assert!(matches!(err, AppError::Json(_)));
    }

    #[test]
    fn documents_are_numbered_from_one() {
        let mut editor = ExpenseEditor::new();
        editor
            .attachments_mut()
            .add_pending("/tmp/a.pdf", None, DocumentKind::Referto);
        assert!(nth_item(&editor, 1).is_ok());
        assert!(nth_item(&editor, 0).is_err());
        assert!(nth_item(&editor, 2).is_err());
    }
}
