//! Command handlers. Each returns whether its check passed.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};

use eightd_core::{
    required, schema, slice, ComplaintContext, PromptBuilder, PromptInput, ResponseParser,
    SectionCatalog, StepCode, StepData, TeamValidator, ValidationTarget,
};
use eightd_runtime::{ModelCoach, ProviderRegistry, RuntimeConfig, StepValidator, ValidationRequest};

pub struct PromptArgs {
    pub step: StepCode,
    pub section: Option<String>,
    pub data: PathBuf,
    pub coaching: PathBuf,
    pub rules: Option<PathBuf>,
    pub complaint: Option<PathBuf>,
}

pub fn sections(step: Option<StepCode>) -> Result<bool> {
    let catalog = SectionCatalog::standard();
    match step {
        Some(step) => print_json(&json!({ "step": step, "sections": catalog.sections(step) }))?,
        None => print_json(&catalog)?,
    }
    Ok(true)
}

pub fn check_team(data: &Path) -> Result<bool> {
    let data = load_step_data(StepCode::D1, data)?;
    let verdict = TeamValidator::new().validate(&data);
    print_json(&verdict)?;
    Ok(verdict.is_pass())
}

pub fn precheck(step: StepCode, data: &Path) -> Result<bool> {
    let data = load_step_data(step, data)?;
    let missing = match required::check(step, &data) {
        Ok(()) => Vec::new(),
        Err(reasons) => reasons,
    };
    print_json(&json!({
        "step": step,
        "passed": missing.is_empty(),
        "missing": missing,
    }))?;
    Ok(missing.is_empty())
}

pub fn prompt(args: PromptArgs) -> Result<bool> {
    let catalog = SectionCatalog::standard();
    let data = load_step_data(args.step, &args.data)?;
    let scoped = Scoped::resolve(&catalog, args.step, args.section.as_deref(), &data)?;

    let coaching = read_text(&args.coaching)?;
    let floor_rules = args.rules.as_deref().map(read_text).transpose()?;
    let complaint = load_complaint(args.complaint.as_deref())?;

    let prompt = PromptBuilder::new().build(&PromptInput {
        target: &scoped.target,
        section_label: scoped.label.as_deref(),
        coaching: &coaching,
        floor_rules: floor_rules.as_deref(),
        complaint: &complaint,
        data: &scoped.data,
    })?;

    println!("{}", prompt);
    Ok(true)
}

pub fn parse(response: &Path) -> Result<bool> {
    let raw = read_text(response)?;
    let verdict = ResponseParser::new().parse(&raw)?;
    print_json(&verdict)?;
    Ok(true)
}

pub async fn coach(
    step: StepCode,
    section: Option<&str>,
    data: &Path,
    complaint: Option<&Path>,
    config: &Path,
) -> Result<bool> {
    if step.is_local_only() {
        bail!("{} is validated locally; use `eightd check-team`", step);
    }

    let config = if config.exists() {
        RuntimeConfig::load(config)?
    } else {
        tracing::info!(path = %config.display(), "Config file not found, using defaults");
        RuntimeConfig::from_env()?
    };
    let coach = ModelCoach::from_config(&config)?;

    let catalog = SectionCatalog::standard();
    let data = load_step_data(step, data)?;
    let scoped = Scoped::resolve(&catalog, step, section, &data)?;
    let complaint = load_complaint(complaint)?;

    let verdict = coach
        .validate(ValidationRequest {
            target: &scoped.target,
            section_label: scoped.label.as_deref(),
            data: &scoped.data,
            complaint: &complaint,
        })
        .await?;

    print_json(&verdict)?;
    Ok(verdict.is_pass())
}

pub fn providers() -> Result<bool> {
    let registry = ProviderRegistry::with_defaults();
    print_json(&registry.describe())?;
    Ok(registry.has_provider(&RuntimeConfig::default().model.provider))
}

/// A validation target with the data it sees.
struct Scoped {
    target: ValidationTarget,
    label: Option<String>,
    data: StepData,
}

impl Scoped {
    fn resolve(
        catalog: &SectionCatalog,
        step: StepCode,
        section: Option<&str>,
        data: &StepData,
    ) -> Result<Self> {
        let Some(key) = section else {
            return Ok(Self {
                target: ValidationTarget::step(step),
                label: None,
                data: data.clone(),
            });
        };
        let def = catalog.section(step, key)?;
        Ok(Self {
            target: ValidationTarget::section(step, def.key.clone()),
            label: Some(def.label.clone()),
            data: slice(data, &def.fields),
        })
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_json(path: &Path) -> Result<JsonValue> {
    let raw = read_text(path)?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {} as JSON", path.display()))
}

fn load_step_data(step: StepCode, path: &Path) -> Result<StepData> {
    Ok(schema::normalize(step, read_json(path)?)?)
}

fn load_complaint(path: Option<&Path>) -> Result<ComplaintContext> {
    match path {
        Some(path) => serde_json::from_value(read_json(path)?)
            .with_context(|| format!("reading complaint context from {}", path.display())),
        None => Ok(ComplaintContext::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
