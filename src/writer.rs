use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::Receiver,
};

use log::{error, info};

use crate::{LifelineError, tracking::TrackingSnapshot};

/// Writes every snapshot received on `snapshot_receiver` as one JSON line, until the sending
/// side hangs up.
pub fn write_tracking(
    file: &Path,
    snapshot_receiver: Receiver<TrackingSnapshot>,
) -> Result<usize, LifelineError> {
    let tracking_file = File::create(file).map_err(|e| LifelineError::WriterError { source: e })?;
    let mut tracking_file_writer = BufWriter::new(tracking_file);
    let mut written = 0;
    for snapshot in &snapshot_receiver {
        if let Err(e) = write_snapshot(&mut tracking_file_writer, &snapshot) {
            error!("Error while writing tracking snapshot to output file: {}", e);
            continue;
        }
        written += 1;
    }
    tracking_file_writer
        .flush()
        .map_err(|e| LifelineError::WriterError { source: e })?;
    info!("Recorded {} tracking snapshots to {:?}", written, file);
    Ok(written)
}

fn write_snapshot(
    writer: &mut impl Write,
    snapshot: &TrackingSnapshot,
) -> Result<(), LifelineError> {
    let line = serde_json::to_string(snapshot)
        .map_err(|e| LifelineError::SnapshotSerializeError { source: e })?;
    writeln!(writer, "{}", line).map_err(|e| LifelineError::WriterError { source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::LocationSimulator;
    use std::sync::mpsc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_recorded_snapshots_can_be_read_back() {
        let output = NamedTempFile::new().unwrap();
        let (tx, rx) = mpsc::channel();

        let mut simulator = LocationSimulator::default();
        let mut expected = Vec::new();
        for _ in 0..4 {
            simulator.tick();
            expected.push(simulator.snapshot());
            tx.send(simulator.snapshot()).unwrap();
        }
        drop(tx);

        assert_eq!(write_tracking(output.path(), rx).unwrap(), 4);

        let recorded = serde_jsonlines::json_lines(output.path())
            .unwrap()
            .collect::<Result<Vec<TrackingSnapshot>, std::io::Error>>()
            .unwrap();
        assert_eq!(recorded.len(), expected.len());
        assert_eq!(
            recorded.iter().map(|s| s.tick).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(recorded[3].eta_minutes, expected[3].eta_minutes);
    }

    #[test]
    fn test_unwritable_path_fails() {
        let (_tx, rx) = mpsc::channel();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            write_tracking(&dir.path().join("missing").join("out.jsonl"), rx),
            Err(LifelineError::WriterError { .. })
        ));
    }
}
