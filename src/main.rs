use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use terraventos::admin::{AdminDashboard, PropertyForm};
use terraventos::auth::{
    guard, AuthForm, AuthMode, AuthPage, MessageKind, RouteDecision, ADMIN_PATH,
};
use terraventos::backend::{AuthProvider, ImageStore, MemoryBackend, PropertyStore, SupabaseClient};
use terraventos::catalog::pages::{featured_properties, list_properties};
use terraventos::catalog::{HomePage, PropertyCard, PropertyDetail};
use terraventos::models::ImageUpload;
use terraventos::{Config, Filters, NumericRange, PropertyId, PropertyType};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_EMAIL: &str = "admin@terraventos.com";
const DEMO_PASSWORD: &str = "terraventos";

#[derive(Parser, Debug)]
#[command(author, version, about = "Terraventos property listings", long_about = None)]
struct Cli {
    /// Run against built-in demo listings instead of the hosted backend
    #[arg(long, global = true)]
    demo: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Admin email, used by commands that need a session
    #[arg(long, global = true, env = "TERRAVENTOS_EMAIL")]
    email: Option<String>,

    /// Admin password
    #[arg(long, global = true, env = "TERRAVENTOS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search and filter listings
    List(ListArgs),
    /// Show one listing with similar suggestions
    Show { id: String },
    /// Show the current featured listing
    Featured,
    /// Save every listing as JSON
    Export {
        #[arg(long, default_value = "raw_listings")]
        dir: PathBuf,
    },
    /// Check admin credentials
    Login,
    /// Create an admin account
    Signup {
        #[arg(long)]
        name: String,
    },
    /// Send a password reset link to --email
    ResetPassword,
    /// Create a listing (admin)
    Add(AddArgs),
    /// Delete a listing and its images (admin)
    Delete { id: String },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Free text matched against title, location and description
    #[arg(short, long, default_value = "")]
    search: String,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long)]
    min_area: Option<f64>,
    #[arg(long)]
    max_area: Option<f64>,
    /// At least this many bedrooms
    #[arg(long)]
    bedrooms: Option<u32>,
    /// At least this many bathrooms
    #[arg(long)]
    bathrooms: Option<u32>,
    #[arg(long)]
    location: Option<String>,
    /// Casa, Apartamento, Terreno, Comercial, Rural or "Lote Urbano"
    #[arg(long = "type")]
    property_type: Option<PropertyType>,
    #[arg(long)]
    featured: Option<bool>,
}

impl ListArgs {
    fn filters(&self) -> Filters {
        let range = |min: Option<f64>, max: Option<f64>| {
            Some(NumericRange::new(min, max)).filter(|r| !r.is_unbounded())
        };
        Filters {
            price_range: range(self.min_price, self.max_price),
            area: range(self.min_area, self.max_area),
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            location: self.location.clone(),
            property_type: self.property_type,
            featured: self.featured,
        }
    }
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    price: String,
    #[arg(long, default_value_t = 1)]
    bedrooms: u32,
    #[arg(long, default_value_t = 1)]
    bathrooms: u32,
    #[arg(long, default_value_t = 0.0)]
    area: f64,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    featured: bool,
    #[arg(long = "type")]
    property_type: Option<PropertyType>,
    #[arg(long)]
    video: Option<String>,
    /// Image files, uploaded in order; the first becomes the cover
    #[arg(long = "image")]
    images: Vec<PathBuf>,
}

struct Services {
    config: Config,
    store: Arc<dyn PropertyStore>,
    images: Arc<dyn ImageStore>,
    auth: Arc<dyn AuthProvider>,
}

fn connect(demo: bool) -> anyhow::Result<Services> {
    if demo {
        info!("Using demo listings (log in with {} / {})", DEMO_EMAIL, DEMO_PASSWORD);
        let backend = Arc::new(
            MemoryBackend::seeded().with_account(DEMO_EMAIL, DEMO_PASSWORD, "Terraventos"),
        );
        return Ok(Services {
            config: Config::offline(),
            store: backend.clone(),
            images: backend.clone(),
            auth: backend,
        });
    }

    let config = Config::from_env().context("Backend not configured (or use --demo)")?;
    let client = Arc::new(SupabaseClient::new(&config)?);
    Ok(Services {
        config,
        store: client.clone(),
        images: client.clone(),
        auth: client,
    })
}

fn print_card(index: usize, card: &PropertyCard) {
    let star = if card.featured { " ★ Destaque" } else { "" };
    println!("{}. {} ({}){}", index + 1, card.title, card.price, star);
    println!("   {}", card.location);
    println!(
        "   {} quartos, {} banheiros, {}",
        card.bedrooms, card.bathrooms, card.area
    );
    println!("   ID: {}", card.id);
    println!("   Imagem: {}", card.cover_image);
    println!("   Contato: {}", card.contact_url);
    println!();
}

/// Sign in with the global credentials when given, then require a session
/// the same way the admin route does.
async fn require_admin(services: &Services, cli: &Cli) -> anyhow::Result<()> {
    if let (Some(email), Some(password)) = (&cli.email, &cli.password) {
        let mut page = AuthPage::new(services.auth.clone(), services.config.site_url.clone());
        *page.edit() = AuthForm {
            email: email.clone(),
            password: password.clone(),
            ..AuthForm::default()
        };
        if page.submit().await.is_none() {
            let reason = page.message().map(|m| m.text.clone()).unwrap_or_default();
            bail!("{}", reason);
        }
    }

    let has_session = services.auth.current_user().await?.is_some();
    if let RouteDecision::Redirect(to) = guard(ADMIN_PATH, has_session) {
        bail!("Acesso restrito: faça login ({}) com --email e --password", to);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("🏠 Terraventos");

    let services = connect(cli.demo)?;

    match &cli.command {
        Command::List(args) => {
            let mut page = HomePage::load(services.store.as_ref())
                .await
                .map_err(|e| anyhow::anyhow!(e.localized("Erro ao buscar propriedades")))?;
            page.set_search_term(args.search.clone());
            page.set_filters(args.filters());

            let visible = page.visible();
            info!("✅ {} of {} properties", visible.len(), page.properties().len());
            for (i, property) in visible.iter().enumerate() {
                print_card(i, &PropertyCard::new(property, &services.config.whatsapp_phone));
            }
        }

        Command::Show { id } => {
            let detail = PropertyDetail::load(
                services.store.as_ref(),
                &PropertyId::new(id.as_str()),
                &services.config.whatsapp_phone,
            )
            .await
            .map_err(|e| anyhow::anyhow!(e.localized("Erro ao carregar propriedade")))?;

            let property = &detail.property;
            println!("{}", property.title.as_deref().unwrap_or("Título indisponível"));
            println!("{}", property.location.as_deref().unwrap_or("Local não informado"));
            println!(
                "{} · {} · publicado {}",
                detail.formatted_price, detail.formatted_area, detail.time_ago
            );
            if let Some(description) = &property.description {
                println!("\n{}\n", description);
            }
            for image in &property.images {
                println!("   🖼  {}", image);
            }
            if let Some(video) = &detail.video_embed_url {
                println!("   ▶  {}", video);
            }
            println!("Contato: {}", detail.contact_url);

            if !detail.similar.is_empty() {
                println!("\nPropriedades similares:");
                let cards = detail.similar_cards(&services.config.whatsapp_phone);
                for (i, card) in cards.iter().enumerate() {
                    print_card(i, card);
                }
            }
        }

        Command::Featured => {
            let limit = services.config.featured_limit;
            let featured = featured_properties(services.store.as_ref(), limit)
                .await
                .map_err(|e| {
                    anyhow::anyhow!(e.localized("Erro ao carregar propriedades em destaque"))
                })?;
            if featured.is_empty() {
                println!("Nenhuma propriedade em destaque.");
            }
            for (i, property) in featured.iter().enumerate() {
                print_card(i, &PropertyCard::new(property, &services.config.whatsapp_phone));
            }
        }

        Command::Export { dir } => {
            let properties = list_properties(services.store.as_ref())
                .await
                .map_err(|e| anyhow::anyhow!(e.localized("Erro ao carregar propriedades")))?;

            let json = serde_json::to_string_pretty(&properties)?;
            tokio::fs::write("properties.json", json).await?;
            info!("💾 Saved all properties to properties.json");

            tokio::fs::create_dir_all(dir).await?;
            for property in &properties {
                let filename = dir.join(format!("{}.json", property.id));
                let prop_json = serde_json::to_string_pretty(property)?;
                tokio::fs::write(&filename, prop_json).await?;
            }
            info!("💾 Saved {} individual property files to {}", properties.len(), dir.display());
        }

        Command::Login => {
            require_admin(&services, &cli).await?;
            println!("Login realizado com sucesso!");
        }

        Command::Signup { name } => {
            let mut page = AuthPage::new(services.auth.clone(), services.config.site_url.clone());
            page.switch_mode(AuthMode::SignUp);
            let password = cli.password.clone().unwrap_or_default();
            *page.edit() = AuthForm {
                email: cli.email.clone().unwrap_or_default(),
                confirm_password: password.clone(),
                password,
                full_name: name.clone(),
            };
            page.submit().await;
            report(&page)?;
        }

        Command::ResetPassword => {
            let mut page = AuthPage::new(services.auth.clone(), services.config.site_url.clone());
            page.edit().email = cli.email.clone().unwrap_or_default();
            page.forgot_password().await;
            report(&page)?;
        }

        Command::Add(args) => {
            require_admin(&services, &cli).await?;
            let mut admin = AdminDashboard::new(services.store.clone(), services.images.clone());

            let mut form = PropertyForm::create();
            form.draft.title = args.title.clone();
            form.draft.location = args.location.clone();
            form.draft.price = args.price.clone();
            form.draft.bedrooms = args.bedrooms;
            form.draft.bathrooms = args.bathrooms;
            form.draft.area = args.area;
            form.draft.description = args.description.clone();
            form.draft.featured = args.featured;
            form.draft.property_type = args.property_type.map(|kind| kind.label().to_string());
            form.draft.youtube_video = args.video.clone();
            for path in &args.images {
                let upload = ImageUpload::from_path(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                form.add_upload(upload);
            }

            match admin.submit(form).await {
                Ok(created) => println!(
                    "Propriedade criada: {} ({} imagens)",
                    created.id,
                    created.images.len()
                ),
                Err(_) => bail!("{}", admin.error().unwrap_or("Erro ao salvar propriedade")),
            }
        }

        Command::Delete { id } => {
            require_admin(&services, &cli).await?;
            let mut admin = AdminDashboard::new(services.store.clone(), services.images.clone());
            if admin.refresh().await.is_err() {
                bail!("{}", admin.error().unwrap_or("Erro ao carregar propriedades"));
            }
            let id = PropertyId::new(id.as_str());
            if admin.open_edit(&id).is_none() {
                bail!("Propriedade não encontrada.");
            }
            if admin.delete(&id).await.is_err() {
                bail!("{}", admin.error().unwrap_or("Erro ao deletar propriedade"));
            }
            println!("Propriedade {} removida.", id);
        }
    }

    Ok(())
}

fn report(page: &AuthPage) -> anyhow::Result<()> {
    match page.message() {
        Some(message) if message.kind == MessageKind::Error => bail!("{}", message.text),
        Some(message) => {
            println!("{}", message.text);
            Ok(())
        }
        None => Ok(()),
    }
}
