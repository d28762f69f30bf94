//! Tables as header plus cell text rows

use assay_core::{
    CapKind, CappedItems, CapsConfig, Collector, CollectorError, CollectorOutput, Deadline,
    DispatchContext, DocumentIndex, Interest, Token,
};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub start_line: Option<usize>,
    /// Inclusive
    pub end_line: Option<usize>,
}

pub struct TablesCollector {
    items: CappedItems<Table>,
}

impl TablesCollector {
    pub fn new(caps: &CapsConfig) -> Self {
        Self {
            items: CappedItems::new(caps.for_kind(CapKind::Tables)),
        }
    }
}

/// Walk one table's token range, reading every cell's text
fn read_table(warehouse: &DocumentIndex, table: usize) -> Table {
    let range = warehouse.line_range(table);
    let mut out = Table {
        start_line: range.map(|r| r.start),
        end_line: range.map(|r| r.last_line()),
        ..Table::default()
    };

    let mut in_head = false;
    let mut row: Vec<String> = Vec::new();
    for i in warehouse.subtree(table) {
        let Some(token) = warehouse.token(i) else {
            break;
        };
        match token.kind() {
            "thead_open" => in_head = true,
            "thead_close" => in_head = false,
            "tr_open" => row.clear(),
            "th_open" | "td_open" => row.push(warehouse.text_of(i).trim().to_string()),
            "tr_close" if in_head => out.header = std::mem::take(&mut row),
            "tr_close" => out.rows.push(std::mem::take(&mut row)),
            _ => {}
        }
    }
    out
}

impl Collector for TablesCollector {
    fn name(&self) -> &str {
        "tables"
    }

    fn interest(&self) -> Interest {
        Interest::new(["table_open"])
    }

    fn on_token(
        &mut self,
        index: usize,
        _token: &Token,
        _ctx: &DispatchContext<'_>,
        warehouse: &DocumentIndex,
    ) -> Result<(), CollectorError> {
        if self.items.is_full() {
            self.items.mark_truncated();
            return Ok(());
        }
        self.items.push(read_table(warehouse, index));
        Ok(())
    }

    fn finalize(
        &mut self,
        _warehouse: &DocumentIndex,
        _deadline: &Deadline,
    ) -> Result<CollectorOutput, CollectorError> {
        Ok(self.items.take_output().map_err(anyhow::Error::from)?)
    }
}
