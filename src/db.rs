// 🗄️ Database - current panel state in SQLite
//
// The database is the "other side" of the diff: its rows are read back into
// the same canonical model the merge produces. Only resolved entries live
// here, so nothing read from it is ever flagged.

use crate::entities::{ClinicalIndication, Confidence, Gene, GeneRef, Panel, PanelGene, PanelKey, PanelSource, Transcript};
use crate::error::DbError;
use crate::snapshot::CanonicalSnapshot;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, info};

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection, DbError> {
    let conn = Connection::open(path)?;

    // WAL for crash recovery; in-memory databases report "memory" instead
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(path = %path.display(), journal_mode = %mode, "database opened");

    setup_database(&conn)?;
    Ok(conn)
}

/// Open an existing database for reading only: no pragma, no DDL, no file creation
pub fn open_database_readonly(path: &Path) -> Result<Connection, DbError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    debug!(path = %path.display(), "database opened read-only");
    Ok(conn)
}

/// Tables the snapshot reader needs, in read order
pub const SNAPSHOT_TABLES: [&str; 6] =
    ["gene", "transcript", "panel", "panel_gene", "superpanel", "clinical_indication"];

fn ensure_tables(conn: &Connection) -> Result<(), DbError> {
    let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    for table in SNAPSHOT_TABLES {
        if !stmt.exists([table])? {
            return Err(DbError::MissingTable(table));
        }
    }
    Ok(())
}

pub fn setup_database(conn: &Connection) -> Result<(), DbError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Genes & transcripts
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS gene (
            hgnc_id TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            is_rna INTEGER NOT NULL DEFAULT 0,
            is_mitochondrial INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transcript (
            accession TEXT PRIMARY KEY,
            hgnc_id TEXT NOT NULL REFERENCES gene(hgnc_id),
            clinical INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Panels, memberships & indications
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS panel (
            panel_id TEXT NOT NULL,
            version TEXT NOT NULL,
            name TEXT,
            source TEXT NOT NULL DEFAULT 'provider',
            PRIMARY KEY (panel_id, version)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS panel_gene (
            panel_id TEXT NOT NULL,
            version TEXT NOT NULL,
            hgnc_id TEXT NOT NULL REFERENCES gene(hgnc_id),
            confidence TEXT NOT NULL,
            PRIMARY KEY (panel_id, version, hgnc_id),
            FOREIGN KEY (panel_id, version) REFERENCES panel(panel_id, version)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS superpanel (
            superpanel_id TEXT NOT NULL,
            superpanel_version TEXT NOT NULL,
            panel_id TEXT NOT NULL,
            version TEXT NOT NULL,
            PRIMARY KEY (superpanel_id, superpanel_version, panel_id, version),
            FOREIGN KEY (superpanel_id, superpanel_version) REFERENCES panel(panel_id, version),
            FOREIGN KEY (panel_id, version) REFERENCES panel(panel_id, version)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS clinical_indication (
            code TEXT PRIMARY KEY,
            name TEXT,
            method TEXT,
            panel_id TEXT NOT NULL,
            version TEXT NOT NULL,
            FOREIGN KEY (panel_id, version) REFERENCES panel(panel_id, version)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transcript_gene ON transcript(hgnc_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SNAPSHOT READ
// ============================================================================

/// Read the whole database into a canonical snapshot.
///
/// Fails with `MissingTable` on a database that lacks the panel schema
/// instead of reading it as empty.
pub fn load_database_snapshot(conn: &Connection) -> Result<CanonicalSnapshot, DbError> {
    ensure_tables(conn)?;
    let mut snapshot = CanonicalSnapshot::new();

    // Genes
    let mut stmt = conn.prepare("SELECT hgnc_id, symbol, is_rna, is_mitochondrial FROM gene")?;
    let genes = stmt
        .query_map([], |row| {
            let mut gene = Gene::new(&row.get::<_, String>(0)?, &row.get::<_, String>(1)?);
            gene.is_rna = row.get(2)?;
            gene.is_mitochondrial = row.get(3)?;
            Ok(gene)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for gene in genes {
        snapshot.genes.insert(gene.hgnc_id.clone(), gene);
    }

    // Transcripts
    let mut stmt = conn.prepare("SELECT accession, hgnc_id, clinical FROM transcript")?;
    let transcripts = stmt
        .query_map([], |row| {
            let accession: String = row.get(0)?;
            let hgnc_id: String = row.get(1)?;
            Ok(Transcript::new(&accession, GeneRef::Resolved(hgnc_id), row.get(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for tx in transcripts {
        snapshot.transcripts.insert(tx.accession.clone(), tx);
    }

    // Panels
    let mut stmt = conn.prepare("SELECT panel_id, version, name, source FROM panel")?;
    let panels = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (panel_id, version, name, source) in panels {
        let key = PanelKey::new(&panel_id, &version);
        let source = PanelSource::parse(&source).ok_or_else(|| DbError::InvalidRow {
            table: "panel",
            key: key.to_string(),
            message: format!("unknown source '{}'", source),
        })?;
        snapshot.panels.insert(key.clone(), Panel::new(key, name, source));
    }

    // Panel memberships
    let mut stmt = conn.prepare(
        "SELECT pg.panel_id, pg.version, pg.hgnc_id, pg.confidence, g.symbol
         FROM panel_gene pg
         JOIN gene g ON g.hgnc_id = pg.hgnc_id",
    )?;
    let memberships = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (panel_id, version, hgnc_id, confidence, symbol) in memberships {
        let key = PanelKey::new(&panel_id, &version);
        let invalid = |message: String| DbError::InvalidRow {
            table: "panel_gene",
            key: format!("{}|{}", key, hgnc_id),
            message,
        };

        let confidence = Confidence::parse(&confidence)
            .ok_or_else(|| invalid(format!("unknown confidence '{}'", confidence)))?;
        let panel = snapshot
            .panels
            .get_mut(&key)
            .ok_or_else(|| invalid("panel row missing".to_string()))?;
        panel.genes.insert(
            GeneRef::Resolved(hgnc_id.clone()),
            PanelGene { confidence, raw_symbol: symbol },
        );
    }

    // Superpanel links
    let mut stmt = conn.prepare("SELECT superpanel_id, superpanel_version, panel_id, version FROM superpanel")?;
    let links = stmt
        .query_map([], |row| {
            Ok((
                PanelKey::new(&row.get::<_, String>(0)?, &row.get::<_, String>(1)?),
                PanelKey::new(&row.get::<_, String>(2)?, &row.get::<_, String>(3)?),
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (superpanel, subpanel) in links {
        let panel = snapshot.panels.get_mut(&superpanel).ok_or_else(|| DbError::InvalidRow {
            table: "superpanel",
            key: format!("{}|{}", superpanel, subpanel),
            message: "superpanel row missing".to_string(),
        })?;
        panel.subpanels.insert(subpanel);
    }

    // Clinical indications
    let mut stmt = conn.prepare("SELECT code, name, method, panel_id, version FROM clinical_indication")?;
    let indications = stmt
        .query_map([], |row| {
            let code: String = row.get(0)?;
            let panel_id: String = row.get(3)?;
            let version: String = row.get(4)?;
            let mut indication = ClinicalIndication::new(&code, PanelKey::new(&panel_id, &version));
            indication.name = row.get(1)?;
            indication.method = row.get(2)?;
            Ok(indication)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for mut indication in indications {
        indication.flagged = !snapshot.panels.contains_key(&indication.panel);
        snapshot.indications.insert(indication.code.clone(), indication);
    }

    info!(
        genes = snapshot.genes.len(),
        transcripts = snapshot.transcripts.len(),
        panels = snapshot.panels.len(),
        indications = snapshot.indications.len(),
        "database snapshot loaded"
    );

    Ok(snapshot)
}

// ============================================================================
// SNAPSHOT STORE
// ============================================================================

/// Upsert the resolved part of a snapshot in one transaction.
///
/// Flagged entries (unresolved genes, indications without a panel) have no
/// row shape in the database and are skipped. Returns the rows written.
pub fn store_snapshot(conn: &mut Connection, snapshot: &CanonicalSnapshot) -> Result<usize, DbError> {
    let tx = conn.transaction()?;
    let mut written = 0;

    for gene in snapshot.genes.values() {
        written += tx.execute(
            "INSERT OR REPLACE INTO gene (hgnc_id, symbol, is_rna, is_mitochondrial)
             VALUES (?1, ?2, ?3, ?4)",
            params![gene.hgnc_id, gene.symbol, gene.is_rna, gene.is_mitochondrial],
        )?;
    }

    for transcript in snapshot.transcripts.values() {
        let Some(gene) = snapshot.gene(&transcript.gene) else {
            continue;
        };
        written += tx.execute(
            "INSERT OR REPLACE INTO transcript (accession, hgnc_id, clinical) VALUES (?1, ?2, ?3)",
            params![transcript.accession, gene.hgnc_id, transcript.clinical],
        )?;
    }

    for panel in snapshot.panels.values() {
        written += tx.execute(
            "INSERT INTO panel (panel_id, version, name, source) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (panel_id, version) DO UPDATE SET name = excluded.name, source = excluded.source",
            params![panel.key.panel_id, panel.key.version, panel.name, panel.source.as_str()],
        )?;

        tx.execute(
            "DELETE FROM panel_gene WHERE panel_id = ?1 AND version = ?2",
            params![panel.key.panel_id, panel.key.version],
        )?;
        for (hgnc_id, entry) in panel.resolved_genes() {
            if !snapshot.genes.contains_key(hgnc_id) {
                continue;
            }
            written += tx.execute(
                "INSERT INTO panel_gene (panel_id, version, hgnc_id, confidence) VALUES (?1, ?2, ?3, ?4)",
                params![panel.key.panel_id, panel.key.version, hgnc_id, entry.confidence.as_str()],
            )?;
        }
    }

    // Links last: both ends must already be panel rows
    for panel in snapshot.panels.values() {
        tx.execute(
            "DELETE FROM superpanel WHERE superpanel_id = ?1 AND superpanel_version = ?2",
            params![panel.key.panel_id, panel.key.version],
        )?;
        for subpanel in &panel.subpanels {
            if !snapshot.panels.contains_key(subpanel) {
                continue;
            }
            written += tx.execute(
                "INSERT INTO superpanel (superpanel_id, superpanel_version, panel_id, version)
                 VALUES (?1, ?2, ?3, ?4)",
                params![panel.key.panel_id, panel.key.version, subpanel.panel_id, subpanel.version],
            )?;
        }
    }

    for indication in snapshot.indications.values() {
        if indication.flagged || !snapshot.panels.contains_key(&indication.panel) {
            continue;
        }
        written += tx.execute(
            "INSERT OR REPLACE INTO clinical_indication (code, name, method, panel_id, version)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                indication.code,
                indication.name,
                indication.method,
                indication.panel.panel_id,
                indication.panel.version,
            ],
        )?;
    }

    tx.commit()?;
    debug!(rows = written, "snapshot stored");
    Ok(written)
}

// ============================================================================
// TESTS
// ============================================================================
