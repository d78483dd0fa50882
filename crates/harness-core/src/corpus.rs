use crate::config::RunConfig;
use crate::errors::ConfigError;
use crate::model::CorpusRecord;
use std::path::Path;

/// Loaded corpus plus the name of the column the source text came from.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub column: String,
    pub records: Vec<CorpusRecord>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn load(cfg: &RunConfig) -> Result<Corpus, ConfigError> {
    let delimiter = cfg.delimiter.unwrap_or_else(|| delimiter_for(&cfg.input));
    load_corpus(&cfg.input, cfg.column.as_deref(), delimiter, cfg.limit)
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Reads the whole corpus up front. Any read or parse failure aborts the run before
/// a single script is executed.
pub fn load_corpus(
    path: &Path,
    column: Option<&str>,
    delimiter: u8,
    limit: Option<usize>,
) -> Result<Corpus, ConfigError> {
    let bytes = std::fs::read(path)
        .map_err(|e| ConfigError(format!("failed to read corpus {}: {}", path.display(), e)))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes.as_slice());

    let headers = reader
        .headers()
        .map_err(|e| ConfigError(format!("failed to parse corpus header {}: {}", path.display(), e)))?
        .clone();

    if headers.is_empty() {
        return Err(ConfigError(format!("corpus {} has no columns", path.display())));
    }

    let (col_idx, col_name) = match column {
        Some(name) => {
            let idx = headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
                ConfigError(format!(
                    "column '{}' not found in {} (available: {})",
                    name,
                    path.display(),
                    headers.iter().collect::<Vec<_>>().join(", ")
                ))
            })?;
            (idx, name.to_string())
        }
        None => (0, headers.get(0).unwrap_or_default().trim().to_string()),
    };

    let mut records = Vec::new();
    for (pos, row) in reader.records().enumerate() {
        if limit.is_some_and(|n| records.len() >= n) {
            break;
        }
        let row = row.map_err(|e| {
            ConfigError(format!(
                "failed to parse corpus {} at row {}: {}",
                path.display(),
                pos + 1,
                e
            ))
        })?;
        records.push(CorpusRecord {
            id: (pos + 1) as u64,
            raw_code: row.get(col_idx).unwrap_or_default().to_string(),
        });
    }

    tracing::info!(
        event = "corpus_loaded",
        path = %path.display(),
        column = %col_name,
        rows = records.len()
    );

    Ok(Corpus {
        column: col_name,
        records,
    })
}
