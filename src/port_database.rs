/*! Keep the ports found by a run in a SQLite database. */

use crate::{port::PortCluster, PortFindResult};
use rusqlite::ToSql;
use std::path::Path;

pub struct PortsDatabase {
    db: rusqlite::Connection,
}

impl PortsDatabase {
    /// Open the database, creating it and the ports table if needed.
    pub fn connect<P: AsRef<Path>>(path_to_db: P) -> PortFindResult<Self> {
        let conn = rusqlite::Connection::open_with_flags(
            path_to_db,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        conn.execute_batch(include_str!("port_database/create_db.sql"))?;

        Ok(PortsDatabase { db: conn })
    }

    /**
     * Start adding ports.
     *
     * Everything added through the handle is committed as one transaction when it is dropped. If
     * any change made through the handle fails, the whole transaction is rolled back instead.
     */
    pub fn add_ports_handle(&self) -> PortFindResult<AddPortsTransaction> {
        let stmt = self.db.prepare(include_str!("port_database/add_port.sql"))?;

        self.db.execute("BEGIN", [])?;
        Ok(AddPortsTransaction {
            stmt,
            conn: &self.db,
            failed: false,
        })
    }

    /// Replace everything stored with `ports` in a single transaction, nothing changes on error.
    pub fn replace_ports(&self, ports: &[PortCluster]) -> PortFindResult<()> {
        let mut add = self.add_ports_handle()?;

        add.clear_ports()?;
        for port in ports {
            add.add_port(port)?;
        }

        Ok(())
    }

    /// All the stored ports, ordered by cluster id.
    pub fn ports(&self) -> PortFindResult<Vec<PortCluster>> {
        let mut stmt = self.db.prepare(include_str!("port_database/query_ports.sql"))?;

        let ports = stmt
            .query_and_then([], |row| {
                Ok(PortCluster {
                    cluster_id: row.get(0)?,
                    centroid_latitude: row.get(1)?,
                    centroid_longitude: row.get(2)?,
                    vessel_count: row.get::<_, i64>(3)? as usize,
                    report_count: row.get::<_, i64>(4)? as usize,
                    radius_km: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;

        Ok(ports)
    }
}

pub struct AddPortsTransaction<'a> {
    stmt: rusqlite::Statement<'a>,
    conn: &'a rusqlite::Connection,
    failed: bool,
}

impl<'a> AddPortsTransaction<'a> {
    /// Remove the ports from earlier runs.
    pub fn clear_ports(&mut self) -> PortFindResult<()> {
        let res = self.conn.execute("DELETE FROM ports", []);
        self.check(res)
    }

    /// Add a port, replacing any stored port with the same cluster id.
    pub fn add_port(&mut self, port: &PortCluster) -> PortFindResult<()> {
        let res = self.stmt.execute([
            &port.cluster_id as &dyn ToSql,
            &port.centroid_latitude,
            &port.centroid_longitude,
            &(port.vessel_count as i64),
            &(port.report_count as i64),
            &port.radius_km,
        ]);
        self.check(res)
    }

    fn check(&mut self, res: rusqlite::Result<usize>) -> PortFindResult<()> {
        if res.is_err() {
            self.failed = true;
        }
        let _ = res?;
        Ok(())
    }
}

impl<'a> Drop for AddPortsTransaction<'a> {
    fn drop(&mut self) {
        let (sql, action) = if self.failed {
            ("ROLLBACK", "roll back")
        } else {
            ("COMMIT", "commit")
        };

        if let Err(err) = self.conn.execute(sql, []) {
            log::error!("unable to {} ports: {}", action, err);
        }
    }
}
