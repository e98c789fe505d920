//! gltfx - inspect and transform glTF/GLB files
//!
//! ```text
//! gltfx info model.glb
//! gltfx pack model.gltf -o model.glb
//! gltfx quantize model.glb --config bits.json -o small.glb
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gltfx_core::{Document, GltfError};
use gltfx_ext::{default_registry, meshopt, quantization, QuantizationConfig};
use gltfx_io::{GltfReader, GltfWriter};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Gltf(#[from] GltfError),

    #[error("cannot read config {}: {}", .path.display(), .message)]
    Config { path: PathBuf, message: String },

    #[error("unsupported output extension for {} (use .gltf or .glb)", .0.display())]
    OutputFormat(PathBuf),
}

type Result<T> = std::result::Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "gltfx")]
#[command(about = "Inspect and transform glTF/GLB files")]
#[command(version)]
struct Cli {
    /// Log per-item detail (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print object counts, extensions and buffers
    Info {
        input: PathBuf,
    },

    /// Convert to GLB
    Pack {
        input: PathBuf,

        /// Output .glb file (default: input with .glb extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert to glTF JSON plus an external .bin
    Unpack {
        input: PathBuf,

        /// Output .gltf file (default: input with .gltf extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Store float vertex attributes as normalized integers (KHR_mesh_quantization)
    Quantize {
        input: PathBuf,

        /// Output .gltf or .glb file (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON file with bit widths, e.g. {"position": 14}
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Restore quantized attributes to floats
    Dequantize {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decompress EXT_meshopt_compression buffer views
    MeshoptDecode {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// What `info` reports about a document.
#[derive(Debug, Clone, PartialEq)]
struct Summary {
    scenes: usize,
    nodes: usize,
    meshes: usize,
    primitives: usize,
    accessors: usize,
    buffer_views: usize,
    materials: usize,
    extensions_used: Vec<String>,
    extensions_required: Vec<String>,
    buffers: Vec<(Option<String>, usize)>,
}

impl Summary {
    fn of(doc: &Document) -> Self {
        Self {
            scenes: doc.scenes.len(),
            nodes: doc.nodes.len(),
            meshes: doc.meshes.len(),
            primitives: doc.meshes.iter().map(|m| m.primitives.len()).sum(),
            accessors: doc.accessors.len(),
            buffer_views: doc.buffer_views.len(),
            materials: doc.materials.len(),
            extensions_used: doc.extensions_used.clone(),
            extensions_required: doc.extensions_required.clone(),
            buffers: doc.buffers.iter().map(|b| (b.uri.clone(), b.byte_length)).collect(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenes:       {}", self.scenes)?;
        writeln!(f, "nodes:        {}", self.nodes)?;
        writeln!(f, "meshes:       {} ({} primitives)", self.meshes, self.primitives)?;
        writeln!(f, "accessors:    {}", self.accessors)?;
        writeln!(f, "buffer views: {}", self.buffer_views)?;
        writeln!(f, "materials:    {}", self.materials)?;
        for name in &self.extensions_used {
            let required = self.extensions_required.contains(name);
            writeln!(f, "extension:    {}{}", name, if required { " (required)" } else { "" })?;
        }
        for (i, (uri, length)) in self.buffers.iter().enumerate() {
            let location = uri.as_deref().map_or("embedded", |u| {
                if u.starts_with("data:") {
                    "data URI"
                } else {
                    u
                }
            });
            writeln!(f, "buffer {}:     {} bytes, {}", i, length, location)?;
        }
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let result = GltfReader::with_registry(default_registry()).open(path)?;
    for notice in &result.notices {
        tracing::warn!(extension = %notice.name, "kept extension as raw JSON: {}", notice.message);
    }
    Ok(result.document)
}

/// Drops the URI of a loaded main buffer so writers treat it as the BIN
/// chunk or the sibling `.bin` file.
fn detach_main_buffer(doc: &mut Document) {
    if let Some(main) = doc.buffers.first_mut() {
        if main.uri.is_some() && main.is_loaded() && !main.is_fallback() {
            main.uri = None;
        }
    }
}

fn write_document(doc: &Document, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "glb" => GltfWriter::new(doc).write_glb(path)?,
        "gltf" => GltfWriter::new(doc).pretty(true).write_gltf(path)?,
        _ => return Err(CliError::OutputFormat(path.to_path_buf())),
    }
    tracing::info!("wrote {}", path.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<QuantizationConfig> {
    let Some(path) = path else {
        return Ok(QuantizationConfig::default());
    };
    let config_error = |message: String| CliError::Config {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read(path).map_err(|e| config_error(e.to_string()))?;
    let config: QuantizationConfig = serde_json::from_slice(&text).map_err(|e| config_error(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Reads `input`, applies `transform` and writes the result to `output`
/// (or back to `input`).
fn rewrite<F>(input: &Path, output: Option<&Path>, transform: F) -> Result<()>
where
    F: FnOnce(&mut Document) -> Result<usize>,
{
    let mut doc = read_document(input)?;
    let changed = transform(&mut doc)?;
    tracing::info!(changed, "transformed {}", input.display());
    write_document(&doc, output.unwrap_or(input))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Info { input } => {
            let doc = read_document(&input)?;
            print!("{}", Summary::of(&doc));
        }
        Commands::Pack { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension("glb"));
            tracing::info!("packing {} -> {}", input.display(), output.display());
            let mut doc = read_document(&input)?;
            detach_main_buffer(&mut doc);
            GltfWriter::new(&doc).write_glb(&output)?;
        }
        Commands::Unpack { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension("gltf"));
            tracing::info!("unpacking {} -> {}", input.display(), output.display());
            let mut doc = read_document(&input)?;
            detach_main_buffer(&mut doc);
            GltfWriter::new(&doc).pretty(true).write_gltf(&output)?;
        }
        Commands::Quantize { input, output, config } => {
            let config = load_config(config.as_deref())?;
            rewrite(&input, output.as_deref(), |doc| Ok(quantization::quantize_all(doc, &config)?))?;
        }
        Commands::Dequantize { input, output } => {
            rewrite(&input, output.as_deref(), |doc| Ok(quantization::dequantize_all(doc)?))?;
        }
        Commands::MeshoptDecode { input, output } => {
            rewrite(&input, output.as_deref(), |doc| Ok(meshopt::decode_all(doc)?))?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gltfx_core::mesh::POSITION;
    use gltfx_core::{append_attribute, Column, Mesh, Primitive, PrimitiveMode};
    use gltfx_ext::meshopt::MeshoptOptions;

    fn write_sample(dir: &Path, name: &str) -> PathBuf {
        let mut doc = Document::new();
        let positions = append_attribute(
            &mut doc,
            &Column::Vec3F32(vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [0.5, 0.25, 0.125]]),
        )
        .unwrap();
        let mut prim = Primitive::new(PrimitiveMode::Points);
        prim.attributes.insert(POSITION.to_string(), positions);
        doc.push_mesh(Mesh {
            primitives: vec![prim],
            ..Mesh::default()
        })
        .unwrap();
        let path = dir.join(name);
        GltfWriter::new(&doc).write_glb(&path).unwrap();
        path
    }

    fn cli(command: Commands) -> Cli {
        Cli {
            verbose: false,
            command,
        }
    }

    #[test]
    fn test_cli_parses() {
        let parsed = Cli::try_parse_from(["gltfx", "-v", "quantize", "in.glb", "--config", "bits.json"]).unwrap();
        assert!(parsed.verbose);
        match parsed.command {
            Commands::Quantize { input, output, config } => {
                assert_eq!(input, PathBuf::from("in.glb"));
                assert_eq!(output, None);
                assert_eq!(config, Some(PathBuf::from("bits.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["gltfx", "meshopt-decode", "a.glb", "-o", "b.glb"]).is_ok());
        assert!(Cli::try_parse_from(["gltfx", "frobnicate"]).is_err());
    }

    #[test]
    fn test_quantize_and_dequantize_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), "model.glb");
        let config = dir.path().join("bits.json");
        fs::write(&config, br#"{"position": 16}"#).unwrap();

        let quantized = dir.path().join("quantized.glb");
        run(cli(Commands::Quantize {
            input: input.clone(),
            output: Some(quantized.clone()),
            config: Some(config),
        }))
        .unwrap();
        let doc = read_document(&quantized).unwrap();
        assert!(doc.is_extension_required(quantization::EXTENSION_NAME));
        let record = doc.meshes[0].primitives[0]
            .extensions
            .read::<quantization::MeshQuantization>()
            .unwrap()
            .unwrap();
        assert_eq!(record.attributes[POSITION].bits, 16);

        run(cli(Commands::Dequantize {
            input: quantized.clone(),
            output: None,
        }))
        .unwrap();
        let doc = read_document(&quantized).unwrap();
        assert!(!doc.is_extension_used(quantization::EXTENSION_NAME));
    }

    #[test]
    fn test_bad_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), "model.glb");
        let config = dir.path().join("bits.json");
        fs::write(&config, br#"{"position": 40}"#).unwrap();
        let result = run(cli(Commands::Quantize {
            input,
            output: None,
            config: Some(config),
        }));
        assert!(matches!(result, Err(CliError::Gltf(GltfError::InvalidInput(_)))));
        assert!(matches!(
            load_config(Some(&dir.path().join("missing.json"))),
            Err(CliError::Config { .. })
        ));
    }

    #[test]
    fn test_unpack_pack_and_info() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), "model.glb");
        let gltf = dir.path().join("unpacked.gltf");
        run(cli(Commands::Unpack {
            input,
            output: Some(gltf.clone()),
        }))
        .unwrap();
        assert!(dir.path().join("unpacked.bin").exists());

        run(cli(Commands::Pack {
            input: gltf.clone(),
            output: None,
        }))
        .unwrap();
        let doc = read_document(&dir.path().join("unpacked.glb")).unwrap();
        let summary = Summary::of(&doc);
        assert_eq!(summary.meshes, 1);
        assert_eq!(summary.primitives, 1);
        assert_eq!(summary.buffers, vec![(None, 36)]);
        assert!(summary.to_string().contains("buffer 0:     36 bytes, embedded"));

        assert!(matches!(
            write_document(&doc, &dir.path().join("out.obj")),
            Err(CliError::OutputFormat(_))
        ));
    }

    #[test]
    fn test_meshopt_decode_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path(), "model.glb");
        let mut doc = read_document(&input).unwrap();
        meshopt::compress_accessor(&mut doc, 0, &MeshoptOptions::default()).unwrap();
        let compressed = dir.path().join("compressed.glb");
        write_document(&doc, &compressed).unwrap();
        let summary = Summary::of(&read_document(&compressed).unwrap());
        assert!(summary.extensions_required.contains(&meshopt::EXTENSION_NAME.to_string()));

        run(cli(Commands::MeshoptDecode {
            input: compressed.clone(),
            output: None,
        }))
        .unwrap();
        let decoded = read_document(&compressed).unwrap();
        assert!(!decoded.is_extension_used(meshopt::EXTENSION_NAME));
        let values = gltfx_core::AccessorReader::new(&decoded).read_f32(0).unwrap();
        assert_eq!(values, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.5, 0.25, 0.125]);
    }
}
