//! Trace export file reading: plain or gzipped JSON, spans grouped per
//! trace id in file order.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::info;

use tracelens_core::error::{Result, TracelensError};
use tracelens_core::model::span::SpanRecord;

use crate::decode::{self, ExportDocument};

/// Spans of one export file, grouped by trace id in first-seen order.
#[derive(Debug, Default)]
pub struct CollectedTraces {
    pub traces: Vec<(String, Vec<SpanRecord>)>,
    pub dropped_spans: usize,
}

impl CollectedTraces {
    pub fn total_spans(&self) -> usize {
        self.traces.iter().map(|(_, spans)| spans.len()).sum()
    }

    fn push(&mut self, span: SpanRecord, index: &mut HashMap<String, usize>) {
        match index.get(&span.trace_id) {
            Some(&slot) => self.traces[slot].1.push(span),
            None => {
                index.insert(span.trace_id.clone(), self.traces.len());
                self.traces.push((span.trace_id.clone(), vec![span]));
            }
        }
    }
}

/// Read one trace export file. Gzip is detected by extension.
pub fn read_trace_file(path: &Path) -> Result<CollectedTraces> {
    let file = File::open(path)
        .map_err(|e| TracelensError::Io(format!("opening {}: {e}", path.display())))?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let document: ExportDocument = serde_json::from_reader(BufReader::new(reader))
        .map_err(|e| TracelensError::Parse(format!("parsing {}: {e}", path.display())))?;
    let collected = collect_document(document);
    info!(
        path = %path.display(),
        traces = collected.traces.len(),
        spans = collected.total_spans(),
        dropped = collected.dropped_spans,
        "trace file read"
    );
    Ok(collected)
}

pub fn collect_document(document: ExportDocument) -> CollectedTraces {
    let mut collected = CollectedTraces::default();
    let mut index: HashMap<String, usize> = HashMap::new();
    for batch in document.batches {
        let service = decode::service_name(&batch.resource);
        for scope in batch.scopes {
            for raw in scope.spans {
                match decode::decode_span(raw, &service) {
                    Some(span) => collected.push(span, &mut index),
                    None => collected.dropped_spans += 1,
                }
            }
        }
    }
    collected
}
