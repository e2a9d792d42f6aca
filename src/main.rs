//! stepcvt - Main entry point
//!
//! Loads a project file, applies command-line answers to it and reports the
//! resulting part attributes.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use stepcvt::answers::parse_answer_tokens;
use stepcvt::cli::{ChoicesCommand, Cli, Commands};
use stepcvt::{CadSource, Choice, PartList, Project};

/// Initialize tracing; `RUST_LOG` overrides the default `info` level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let path = cli.json.as_path();
    match cli.command {
        Commands::Make { name } => make_project(path, &name),
        Commands::Name { name } => {
            let mut project = Project::load_from_file(path)?;
            info!("Renaming project '{}' to '{}'", project.name, name);
            project.name = name;
            project.save_to_file(path)
        }
        Commands::Choices { action } => {
            let mut project = Project::load_from_file(path)?;
            match action.unwrap_or(ChoicesCommand::List) {
                ChoicesCommand::List => {
                    print_choices(&project);
                    return Ok(());
                }
                ChoicesCommand::Add {
                    choice_type,
                    text,
                    varname,
                    values,
                } => {
                    let choice = Choice::from_values(choice_type, text, varname, values)?;
                    let label = format!("{} choice {}", choice.kind(), choice.varname());
                    project.add_choice(choice)?;
                    println!("✓ Added {}", label);
                }
                ChoicesCommand::Remove {
                    varname,
                    choice_value: Some(value_id),
                    cond: true,
                } => {
                    project.set_precondition(&varname, &value_id, None)?;
                    println!("✓ Cleared condition of {}.{}", varname, value_id);
                }
                ChoicesCommand::Remove {
                    varname,
                    choice_value: Some(value_id),
                    ..
                } => {
                    project.remove_choice_value(&varname, &value_id)?;
                    println!("✓ Removed value {} from {}", value_id, varname);
                }
                ChoicesCommand::Remove { varname, .. } => {
                    project.remove_choice(&varname)?;
                    println!("✓ Removed choice {}", varname);
                }
            }
            project.save_to_file(path)
        }
        Commands::AddSource { name, path: cad } => {
            let mut project = Project::load_from_file(path)?;
            let cad = std::path::absolute(&cad)
                .with_context(|| format!("Failed to resolve {:?}", cad))?;
            project.add_source(CadSource::new(name, cad))?;
            project.save_to_file(path)
        }
        Commands::AddPart { ids, from, source } => {
            let mut project = Project::load_from_file(path)?;
            let target = project.source_for_parts_mut(source.as_deref())?;
            let mut added = target.sync_parts(ids.as_slice())?;
            if let Some(list) = from {
                added += target
                    .sync_parts(&PartList::new(&list))
                    .with_context(|| format!("Failed to read part list {:?}", list))?;
            }
            println!("✓ Added {} part(s) to {}", added, target.name);
            project.save_to_file(path)
        }
        Commands::RemovePart { ids, source } => {
            let mut project = Project::load_from_file(path)?;
            let target = project.source_for_parts_mut(source.as_deref())?;
            let removed = target.remove_parts(&ids);
            println!("✓ Removed {} part(s) from {}", removed, target.name);
            project.save_to_file(path)
        }
        Commands::EditPart { id, count, source } => {
            let mut project = Project::load_from_file(path)?;
            project
                .source_for_parts_mut(source.as_deref())?
                .set_default_count(&id, count)?;
            info!("Baseline count of '{}' set to {}", id, count);
            project.save_to_file(path)
        }
        Commands::Validate { answers } => {
            let project = Project::load_from_file(path)?;
            let raw = parse_answer_tokens(&answers)?;
            let validated = project
                .available_choices
                .validate(&raw)
                .context("Answers rejected")?;
            println!("✓ {} answer(s) are valid", validated.len());
            Ok(())
        }
        Commands::Apply { answers, dry_run } => {
            let mut project = Project::load_from_file(path)?;
            let raw = parse_answer_tokens(&answers)?;
            let report = project.apply_choices(&raw)?;

            for (part_id, err) in report.failures() {
                eprintln!("✗ {}: {}", part_id, err);
            }
            print_parts(&project);

            if dry_run {
                info!("Dry run: {:?} not written", path);
            } else {
                project.save_to_file(path)?;
                info!("Updated {} part(s) in {:?}", report.committed(), path);
            }
            Ok(())
        }
        Commands::Parts => {
            let project = Project::load_from_file(path)?;
            print_parts(&project);
            Ok(())
        }
    }
}

fn make_project(path: &Path, name: &str) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Project file {:?} already exists", path);
    }
    Project::new(name).save_to_file(path)?;
    println!("✓ Created project '{}' in {:?}", name, path);
    Ok(())
}

fn print_choices(project: &Project) {
    println!("Project: {}", project.name);
    for choice in project.available_choices.topological_order() {
        println!("{} ({}) - {}", choice.varname(), choice.kind(), choice.text());
        for value in choice.values() {
            match &value.precondition {
                Some(pre) => println!("    {:<16} {}  [if {}]", value.value_id, value.display_text, pre),
                None => println!("    {:<16} {}", value.value_id, value.display_text),
            }
        }
    }
}

fn print_parts(project: &Project) {
    println!("{:<16} {:<24} {:>8} {:>6} {:>6}", "SOURCE", "PART", "SELECTED", "COUNT", "SCALE");
    for (source, part) in project.parts() {
        println!(
            "{:<16} {:<24} {:>8} {:>6} {:>6}",
            source,
            part.part_id,
            if part.selected { "yes" } else { "no" },
            part.count,
            part.scale
        );
    }
}
