//! Staging queues and their bulk flush statements
//!
//! Comments, downtimes, custom variables and log entries arrive in bursts;
//! each kind is staged in memory and flushed as a single multi-row upsert
//! on the flusher's cadence. The statements are built as literal SQL (one
//! VALUES tuple per staged row) because the row count varies per flush.

use vigil_protocol::{Comment, CustomVariable, CustomVariableStatus, Downtime, LogEntry};

use crate::actions::Action;
use crate::pool::SpecialConn;
use crate::schema::ColumnSizes;

/// One flushable statement and where it must run
pub struct FlushStatement {
    pub conn: SpecialConn,
    pub mask: u32,
    pub sql: String,
}

/// In-memory staging for the bulk-loaded event kinds
#[derive(Debug, Default)]
pub struct StagingQueues {
    comments: Vec<Comment>,
    downtimes: Vec<Downtime>,
    custom_variables: Vec<CustomVariable>,
    custom_variable_statuses: Vec<CustomVariableStatus>,
    logs: Vec<LogEntry>,
}

/// Escape a string for inclusion as a SQL literal
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

fn join_rows(rows: impl Iterator<Item = String>) -> String {
    rows.collect::<Vec<_>>().join(",")
}

impl StagingQueues {
    /// Stage one comment
    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Stage one downtime
    pub fn push_downtime(&mut self, downtime: Downtime) {
        self.downtimes.push(downtime);
    }

    /// Stage one custom variable definition
    pub fn push_custom_variable(&mut self, cv: CustomVariable) {
        self.custom_variables.push(cv);
    }

    /// Stage one custom variable value change
    pub fn push_custom_variable_status(&mut self, cvs: CustomVariableStatus) {
        self.custom_variable_statuses.push(cvs);
    }

    /// Stage one log entry
    pub fn push_log(&mut self, log: LogEntry) {
        self.logs.push(log);
    }

    /// Rows currently staged across all queues
    pub fn staged_rows(&self) -> usize {
        self.comments.len()
            + self.downtimes.len()
            + self.custom_variables.len()
            + self.custom_variable_statuses.len()
            + self.logs.len()
    }

    /// Drain every non-empty queue into its bulk statement
    pub fn take_flush(&mut self, sizes: &ColumnSizes) -> Vec<FlushStatement> {
        let mut out = Vec::new();

        if !self.comments.is_empty() {
            let rows = join_rows(self.comments.drain(..).map(|c| {
                format!(
                    "({},{},{},{},{},{},{},{},{},{},{},{},{},{})",
                    c.internal_id,
                    c.instance_id,
                    c.host_id,
                    c.service_id,
                    c.entry_time,
                    quote(sizes.fit("comments", "author", &c.author)),
                    quote(&c.data),
                    c.comment_type,
                    c.entry_type,
                    c.deletion_time,
                    c.expire_time,
                    c.expires as i64,
                    c.persistent as i64,
                    c.source,
                )
            }));
            out.push(FlushStatement {
                conn: SpecialConn::Downtime,
                mask: Action::Comments.mask(),
                sql: format!(
                    "INSERT INTO comments (internal_id,instance_id,host_id,service_id,\
                     entry_time,author,data,type,entry_type,deletion_time,expire_time,\
                     expires,persistent,source) VALUES {rows} \
                     ON CONFLICT(instance_id,internal_id) DO UPDATE SET \
                     deletion_time=excluded.deletion_time, data=excluded.data, \
                     entry_type=excluded.entry_type, expire_time=excluded.expire_time"
                ),
            });
        }

        if !self.downtimes.is_empty() {
            let rows = join_rows(self.downtimes.drain(..).map(|d| {
                format!(
                    "({},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{})",
                    d.internal_id,
                    d.instance_id,
                    d.host_id,
                    d.service_id,
                    d.entry_time,
                    quote(sizes.fit("downtimes", "author", &d.author)),
                    quote(&d.comment),
                    d.downtime_type,
                    d.start_time,
                    d.end_time,
                    d.actual_start_time,
                    d.actual_end_time,
                    d.duration,
                    d.triggered_by,
                    d.fixed as i64,
                    d.started as i64,
                    d.cancelled as i64,
                    d.deletion_time,
                )
            }));
            out.push(FlushStatement {
                conn: SpecialConn::Downtime,
                mask: Action::Downtimes.mask(),
                sql: format!(
                    "INSERT INTO downtimes (internal_id,instance_id,host_id,service_id,\
                     entry_time,author,comment_data,type,start_time,end_time,\
                     actual_start_time,actual_end_time,duration,triggered_by,fixed,\
                     started,cancelled,deletion_time) VALUES {rows} \
                     ON CONFLICT(instance_id,internal_id) DO UPDATE SET \
                     actual_start_time=excluded.actual_start_time, \
                     actual_end_time=excluded.actual_end_time, \
                     started=excluded.started, cancelled=excluded.cancelled, \
                     deletion_time=excluded.deletion_time"
                ),
            });
        }

        if !self.custom_variables.is_empty() {
            let rows = join_rows(self.custom_variables.drain(..).map(|cv| {
                format!(
                    "({},{},{},{},{},{},{},{})",
                    cv.host_id,
                    cv.service_id,
                    quote(sizes.fit("customvariables", "name", &cv.name)),
                    quote(sizes.fit("customvariables", "value", &cv.value)),
                    quote(sizes.fit("customvariables", "default_value", &cv.default_value)),
                    cv.var_type,
                    cv.modified as i64,
                    cv.update_time,
                )
            }));
            out.push(FlushStatement {
                conn: SpecialConn::CustomVariable,
                mask: Action::CustomVariables.mask(),
                sql: format!(
                    "INSERT INTO customvariables (host_id,service_id,name,value,\
                     default_value,type,modified,update_time) VALUES {rows} \
                     ON CONFLICT(host_id,service_id,name) DO UPDATE SET \
                     value=excluded.value, default_value=excluded.default_value, \
                     type=excluded.type, modified=excluded.modified, \
                     update_time=excluded.update_time"
                ),
            });
        }

        if !self.custom_variable_statuses.is_empty() {
            let rows = join_rows(self.custom_variable_statuses.drain(..).map(|cvs| {
                format!(
                    "({},{},{},{},{},{})",
                    cvs.host_id,
                    cvs.service_id,
                    quote(sizes.fit("customvariables", "name", &cvs.name)),
                    quote(sizes.fit("customvariables", "value", &cvs.value)),
                    cvs.modified as i64,
                    cvs.update_time,
                )
            }));
            out.push(FlushStatement {
                conn: SpecialConn::CustomVariable,
                mask: Action::CustomVariables.mask(),
                sql: format!(
                    "INSERT INTO customvariables (host_id,service_id,name,value,\
                     modified,update_time) VALUES {rows} \
                     ON CONFLICT(host_id,service_id,name) DO UPDATE SET \
                     value=excluded.value, modified=excluded.modified, \
                     update_time=excluded.update_time"
                ),
            });
        }

        if !self.logs.is_empty() {
            let rows = join_rows(self.logs.drain(..).map(|l| {
                format!(
                    "({},{},{},{},{},{},{},{},{},{},{},{})",
                    l.ctime,
                    quote(sizes.fit("logs", "instance_name", &l.instance_name)),
                    l.host_id,
                    quote(sizes.fit("logs", "host_name", &l.host_name)),
                    l.service_id,
                    quote(sizes.fit("logs", "service_description", &l.service_description)),
                    quote(&l.output),
                    l.status,
                    l.msg_type,
                    l.retry,
                    quote(sizes.fit("logs", "notification_cmd", &l.notification_cmd)),
                    quote(sizes.fit("logs", "notification_contact", &l.notification_contact)),
                )
            }));
            out.push(FlushStatement {
                conn: SpecialConn::Log,
                mask: Action::Logs.mask(),
                sql: format!(
                    "INSERT INTO logs (ctime,instance_name,host_id,host_name,service_id,\
                     service_description,output,status,msg_type,retry,notification_cmd,\
                     notification_contact) VALUES {rows}"
                ),
            });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("O'Brien"), "'O''Brien'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_flush_drains_queues() {
        let sizes = ColumnSizes::default();
        let mut queues = StagingQueues::default();
        queues.push_log(LogEntry {
            ctime: 100,
            output: "it's broken".into(),
            ..Default::default()
        });
        queues.push_custom_variable(CustomVariable {
            host_id: 1,
            name: "ROLE".into(),
            value: "edge".into(),
            ..Default::default()
        });
        assert_eq!(queues.staged_rows(), 2);

        let statements = queues.take_flush(&sizes);
        assert_eq!(statements.len(), 2);
        assert_eq!(queues.staged_rows(), 0);

        let log_sql = &statements
            .iter()
            .find(|s| s.conn == SpecialConn::Log)
            .unwrap()
            .sql;
        assert!(log_sql.contains("'it''s broken'"));
        assert!(log_sql.starts_with("INSERT INTO logs"));
    }

    #[test]
    fn test_multi_row_values() {
        let sizes = ColumnSizes::default();
        let mut queues = StagingQueues::default();
        for i in 0..3 {
            queues.push_downtime(Downtime {
                instance_id: 1,
                internal_id: i,
                ..Default::default()
            });
        }
        let statements = queues.take_flush(&sizes);
        assert_eq!(statements.len(), 1);
        // Three VALUES tuples in one statement.
        assert_eq!(statements[0].sql.matches("),(").count(), 2);
    }
}
