use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Encode a single event to [len][bincode][crc32] format. Returns the
/// number of bytes written.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "WAL record too large"))?;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(8 + u64::from(len))
}

/// Append-only Write-Ahead Log for calendar and ledger events.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - Truncated last entry (crash) is safely discarded via length-prefix + CRC check.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    /// File length covered by the last successful fsync.
    synced_len: u64,
    pending_bytes: u64,
    pending_appends: u64,
}

impl Wal {
    /// Open (or create) the WAL file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let synced_len = file.metadata()?.len();
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
            synced_len,
            pending_bytes: 0,
            pending_appends: 0,
        })
    }

    /// Append a single event and fsync. Tests only; the engine commits
    /// through `append_batch`.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_batch(std::iter::once(event))
    }

    /// Buffer every event, then flush and fsync once. On any failure the
    /// whole batch is rolled back so none of it can reach disk later.
    pub fn append_batch<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> io::Result<()> {
        let written = events
            .into_iter()
            .try_for_each(|event| self.append_buffered(event))
            .and_then(|()| self.flush_sync());
        if let Err(e) = written {
            if let Err(rollback) = self.discard_unsynced() {
                tracing::error!(path = %self.path.display(), "WAL rollback failed: {rollback}");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Append a single event to the BufWriter without flushing or syncing.
    fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        self.pending_bytes += encode_event(&mut self.writer, event)?;
        self.pending_appends += 1;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush the BufWriter and fsync the underlying file.
    fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.synced_len += self.pending_bytes;
        self.pending_bytes = 0;
        self.pending_appends = 0;
        Ok(())
    }

    /// Drop everything written since the last fsync: bytes still in the
    /// buffer and bytes the kernel accepted without a successful sync.
    fn discard_unsynced(&mut self) -> io::Result<()> {
        self.appends_since_compact = self.appends_since_compact.saturating_sub(self.pending_appends);
        self.pending_appends = 0;
        self.pending_bytes = 0;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts hands back the buffer instead of flushing it on drop.
        let (_, _unwritten) = stale.into_parts();

        let file = self.writer.get_ref();
        file.set_len(self.synced_len)?;
        file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a compacted event list to a temp file next to the WAL and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Rename the temp file over the WAL and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.synced_len = file.metadata()?.len();
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        self.pending_bytes = 0;
        self.pending_appends = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replay the WAL from disk, returning all valid events.
    /// Truncated/corrupt trailing entries are silently discarded.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        Ok(Self::read_valid(path)?.0)
    }

    /// Replay, then cut the file back to its last valid record so new
    /// appends don't land behind a torn tail that replay would stop at.
    pub fn recover(path: &Path) -> io::Result<Vec<Event>> {
        let (events, valid_len) = Self::read_valid(path)?;
        match fs::metadata(path) {
            Ok(meta) if meta.len() > valid_len => {
                tracing::warn!(
                    path = %path.display(),
                    dropped_bytes = meta.len() - valid_len,
                    "truncating WAL to last valid record"
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(valid_len)?;
                file.sync_all()?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(events)
    }

    /// Valid events and the byte length of the prefix holding them.
    fn read_valid(path: &Path) -> io::Result<(Vec<Event>, u64)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut valid_len = 0u64;

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as u64;
            if valid_len + 8 + len > file_len {
                break; // truncated
            }

            let mut payload = vec![0u8; len as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                tracing::warn!(path = %path.display(), "WAL checksum mismatch, dropping tail");
                break;
            }

            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
            valid_len += 8 + len;
        }

        Ok((events, valid_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::Utc;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("hotelbook_test_wal");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn hotel(id: u32) -> HotelId {
        HotelId::new(id).unwrap()
    }

    fn provisioned(hotel_id: u32, date: &str, rooms: u32) -> Event {
        Event::DaysProvisioned {
            hotel_id: hotel(hotel_id),
            days: vec![AvailabilityDay {
                date: parse_date(date).unwrap(),
                total_rooms: rooms,
                available_rooms: rooms,
            }],
        }
    }

    fn committed(hotel_id: u32) -> Event {
        Event::BookingCommitted {
            booking: Booking {
                id: Ulid::new(),
                email: "a@example.com".into(),
                hotel_id: hotel(hotel_id),
                stay: StayRange::parse("2025-06-01", "2025-06-02").unwrap(),
                guests: 1,
                total_price: 100,
                booked_at: Utc::now(),
                request_id: None,
            },
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let _ = fs::remove_file(&path);

        let events = vec![provisioned(1, "2025-06-01", 3), committed(1)];

        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, events);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_handles_truncation() {
        let path = tmp_path("truncation.wal");
        let _ = fs::remove_file(&path);

        let event = provisioned(1, "2025-06-01", 3);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&event).unwrap();
        }

        // Partial second entry, as left behind by a crash mid-write
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0u8; 6]).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![event]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_nonexistent_file() {
        let path = tmp_path("nonexistent.wal");
        let _ = fs::remove_file(&path);
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_stops_at_corrupt_crc() {
        let path = tmp_path("corrupt_crc.wal");
        let _ = fs::remove_file(&path);

        let good = provisioned(2, "2025-06-01", 1);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
        }
        {
            let payload = bincode::serialize(&committed(2)).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEADBEEFu32.to_le_bytes()).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![good]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_then_append() {
        let path = tmp_path("compact_append.wal");
        let _ = fs::remove_file(&path);

        let snapshot = vec![provisioned(1, "2025-06-01", 2)];
        let after = committed(1);

        {
            let mut wal = Wal::open(&path).unwrap();
            for _ in 0..20 {
                wal.append(&committed(1)).unwrap();
            }
            let before = fs::metadata(&path).unwrap().len();
            wal.compact(&snapshot).unwrap();
            assert_eq!(wal.appends_since_compact(), 0);
            let compacted = fs::metadata(&path).unwrap().len();
            assert!(compacted < before, "compacted WAL should be smaller: {compacted} < {before}");
            wal.append(&after).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0], snapshot[0]);
        assert_eq!(replayed[1], after);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn append_buffered_then_flush_sync() {
        let path = tmp_path("buffered_flush.wal");
        let _ = fs::remove_file(&path);

        let events: Vec<Event> = (1..=5).map(committed).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            assert_eq!(wal.appends_since_compact(), 5);
            wal.flush_sync().unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), events);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn recover_truncates_torn_tail() {
        let path = tmp_path("recover_torn_tail.wal");
        let _ = fs::remove_file(&path);

        let good = provisioned(1, "2025-06-01", 2);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
        }
        let clean_len = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[7u8; 5]).unwrap();
        }

        assert_eq!(Wal::recover(&path).unwrap(), vec![good.clone()]);
        assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);

        // Appends after recovery are visible to the next replay.
        let after = provisioned(1, "2025-06-02", 2);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&after).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![good, after]);
    }

    #[test]
    fn failed_batch_never_reaches_disk() {
        let path = tmp_path("failed_batch.wal");
        let _ = fs::remove_file(&path);

        let before = provisioned(1, "2025-06-01", 2);
        let failed = vec![committed(1), committed(1)];
        let after = provisioned(1, "2025-06-02", 2);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&before).unwrap();

            // A read-only handle makes the batch flush fail.
            wal.writer = BufWriter::new(File::open(&path).unwrap());
            assert!(wal.append_batch(&failed).is_err());
            assert_eq!(wal.appends_since_compact(), 1);

            wal.append_batch([&after]).unwrap();
            assert_eq!(wal.appends_since_compact(), 2);
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![before, after]);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn discard_cuts_flushed_but_unsynced_bytes() {
        let path = tmp_path("discard_unsynced.wal");
        let _ = fs::remove_file(&path);

        let good = provisioned(2, "2025-06-01", 1);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
            let synced = fs::metadata(&path).unwrap().len();

            wal.append_buffered(&committed(2)).unwrap();
            wal.writer.flush().unwrap();
            assert!(fs::metadata(&path).unwrap().len() > synced);

            wal.discard_unsynced().unwrap();
            assert_eq!(fs::metadata(&path).unwrap().len(), synced);
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![good]);

        let _ = fs::remove_file(&path);
    }
}
