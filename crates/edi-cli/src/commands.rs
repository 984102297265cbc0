//! The `parse`, `validate` and `detect` commands

use crate::detect::{Detected, detect};
use crate::{Cli, Commands, EXIT_DOCUMENT_ERRORS, FormatArg, OutputKind, SourceArgs};
use anyhow::{Context, Result, bail};
use edi_adapter_ach::{AchParser, AchSerializer};
use edi_adapter_edifact::{EdifactParser, EdifactSerializer};
use edi_adapter_tradacoms::{TradacomsParser, TradacomsSerializer};
use edi_ir::{DocumentErrors, Format};
use edi_parser::{ParserConfig, ParsedDocument};
use edi_schema::{SchemaLoader, SchemaRegistry};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

pub fn execute(cli: &Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::Parse {
            source,
            output,
            errors_json,
        } => parse(cli.config.as_deref(), source, *output, *errors_json),
        Commands::Validate { source, errors_json } => validate(cli.config.as_deref(), source, *errors_json),
        Commands::Detect { input } => detect_file(input),
    }
}

/// A parse either produced a document or was turned down with its errors
enum Parsed {
    Document(ParsedDocument),
    Rejected { reason: String, errors: DocumentErrors },
}

struct Source {
    format: Format,
    bytes: Vec<u8>,
}

fn read_source(source: &SourceArgs) -> Result<Source> {
    let bytes = std::fs::read(&source.input).with_context(|| format!("reading {}", source.input.display()))?;
    let format = match source.format {
        FormatArg::Edifact => Format::Edifact,
        FormatArg::Tradacoms => Format::Tradacoms,
        FormatArg::Ach => Format::Ach,
        FormatArg::Auto => match detect(&bytes) {
            Detected::Supported(format) => format,
            Detected::X12 => bail!("{} is an X12 interchange, which is not supported", source.input.display()),
            Detected::Unknown => bail!("cannot tell the format of {}", source.input.display()),
        },
    };
    info!("Reading {} as {}", source.input.display(), format);
    Ok(Source { format, bytes })
}

fn load_config(path: Option<&Path>) -> Result<ParserConfig> {
    match path {
        Some(path) => ParserConfig::load(path).with_context(|| format!("loading configuration {}", path.display())),
        None => Ok(ParserConfig::default()),
    }
}

fn load_schemas(format: Format, paths: &[PathBuf]) -> Result<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    if format == Format::Ach {
        edi_adapter_ach::layouts::register_defaults(&registry);
    }
    for path in paths {
        SchemaLoader::new()
            .load_from_file(path)
            .with_context(|| format!("loading schema {}", path.display()))?
            .register(&registry);
        info!("Loaded schema {}", path.display());
    }
    Ok(registry)
}

fn settle<E>(result: std::result::Result<ParsedDocument, E>, errors: fn(&E) -> Option<&DocumentErrors>) -> Result<Parsed>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match result {
        Ok(doc) => Ok(Parsed::Document(doc)),
        Err(e) => match errors(&e).cloned() {
            Some(errors) => Ok(Parsed::Rejected {
                reason: e.to_string(),
                errors,
            }),
            None => Err(e.into()),
        },
    }
}

fn run_parser(source: &Source, config: ParserConfig, registry: SchemaRegistry) -> Result<Parsed> {
    let input = source.bytes.as_slice();
    match source.format {
        Format::Edifact => settle(
            EdifactParser::new(config, registry).parse_document(input),
            edi_adapter_edifact::Error::errors,
        ),
        Format::Tradacoms => settle(
            TradacomsParser::new(config, registry).parse_document(input),
            edi_adapter_tradacoms::Error::errors,
        ),
        Format::Ach => settle(
            AchParser::new(config, registry).parse_document(input),
            edi_adapter_ach::Error::errors,
        ),
    }
}

fn serialize(doc: &ParsedDocument) -> Result<Vec<u8>> {
    let envelope = &doc.envelope;
    Ok(match envelope.format {
        Format::Edifact => EdifactSerializer::new().serialize(envelope)?,
        Format::Tradacoms => TradacomsSerializer::new().serialize(envelope)?,
        Format::Ach => AchSerializer::new().serialize(envelope)?,
    })
}

fn report(errors: &DocumentErrors, json: bool, out: &mut dyn Write) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, errors)?;
        writeln!(out)?;
    } else {
        for record in errors {
            writeln!(out, "{record}")?;
        }
    }
    Ok(())
}

fn parse(config: Option<&Path>, source: &SourceArgs, output: OutputKind, errors_json: bool) -> Result<ExitCode> {
    let config = load_config(config)?;
    let input = read_source(source)?;
    let registry = load_schemas(input.format, &source.schema)?;

    let doc = match run_parser(&input, config, registry)? {
        Parsed::Document(doc) => doc,
        Parsed::Rejected { reason, errors } => {
            eprintln!("ERROR: {reason}");
            report(&errors, errors_json, &mut std::io::stderr())?;
            return Ok(ExitCode::from(EXIT_DOCUMENT_ERRORS));
        }
    };

    let rendered = match output {
        OutputKind::Xml => edi_ir::xml::to_xml(&doc.envelope)?.into_bytes(),
        OutputKind::Edi => serialize(&doc)?,
    };
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&rendered)?;
    stdout.flush()?;

    report(&doc.errors, errors_json, &mut std::io::stderr())?;
    eprintln!(
        "Parse summary: format={}, transaction_sets={}, errors={}{}",
        doc.envelope.format,
        doc.envelope.transaction_set_count(),
        doc.errors.len(),
        if doc.is_complete() { "" } else { " (halted)" }
    );
    Ok(ExitCode::SUCCESS)
}

fn validate(config: Option<&Path>, source: &SourceArgs, errors_json: bool) -> Result<ExitCode> {
    let mut config = load_config(config)?;
    config.auto_validate = true;
    let input = read_source(source)?;
    let registry = load_schemas(input.format, &source.schema)?;

    let errors = match run_parser(&input, config, registry)? {
        Parsed::Document(doc) => doc.errors,
        Parsed::Rejected { reason, errors } => {
            eprintln!("ERROR: {reason}");
            errors
        }
    };
    report(&errors, errors_json, &mut std::io::stdout())?;
    if errors.is_empty() {
        if !errors_json {
            println!("{}: valid", source.input.display());
        }
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{}: {} error(s)", source.input.display(), errors.len());
        Ok(ExitCode::from(EXIT_DOCUMENT_ERRORS))
    }
}

fn detect_file(path: &Path) -> Result<ExitCode> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    match detect(&bytes) {
        Detected::Supported(format) => {
            println!("{format}");
            Ok(ExitCode::SUCCESS)
        }
        Detected::X12 => bail!("{} is an X12 interchange, which is not supported", path.display()),
        Detected::Unknown => bail!("cannot tell the format of {}", path.display()),
    }
}
