//! List items with nesting depth and task state

use assay_core::{
    CapKind, CappedItems, CapsConfig, Collector, CollectorError, CollectorOutput, Deadline,
    DispatchContext, DocumentIndex, Interest, Token,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListItem {
    /// 1 for a top-level item
    pub depth: usize,
    pub ordered: bool,
    /// Text of the item's first inline run
    pub text: String,
    /// `Some(checked)` for task list items
    pub task: Option<bool>,
    pub line: Option<usize>,
}

pub struct ListItemsCollector {
    items: CappedItems<ListItem>,
    /// Open lists as `(closer, ordered)`
    lists: Vec<(usize, bool)>,
    /// Open items as `(closer, slot in items)`; no slot once the cap is hit
    open_items: Vec<(usize, Option<usize>)>,
}

impl ListItemsCollector {
    pub fn new(caps: &CapsConfig) -> Self {
        Self {
            items: CappedItems::new(caps.for_kind(CapKind::ListItems)),
            lists: Vec::new(),
            open_items: Vec::new(),
        }
    }

    /// Drop every tracked block whose closer is at or before `index`. Only
    /// paired openers are tracked and pairs nest, so closed blocks are always
    /// on top.
    fn retire(&mut self, index: usize) {
        while self.lists.last().is_some_and(|&(closer, _)| closer <= index) {
            self.lists.pop();
        }
        while self.open_items.last().is_some_and(|&(closer, _)| closer <= index) {
            self.open_items.pop();
        }
    }

    /// The stored item owning the innermost open `list_item`
    fn current(&mut self) -> Option<&mut ListItem> {
        let slot = self.open_items.last()?.1?;
        self.items.get_mut(slot)
    }
}

impl Collector for ListItemsCollector {
    fn name(&self) -> &str {
        "list_items"
    }

    fn interest(&self) -> Interest {
        Interest::new([
            "bullet_list_open",
            "bullet_list_close",
            "ordered_list_open",
            "ordered_list_close",
            "list_item_open",
            "list_item_close",
            "inline",
            "task_marker",
        ])
    }

    fn should_process(&self, _index: usize, token: &Token, _ctx: &DispatchContext<'_>) -> bool {
        match token.kind() {
            "inline" | "task_marker" => !self.open_items.is_empty(),
            _ => true,
        }
    }

    fn on_token(
        &mut self,
        index: usize,
        token: &Token,
        _ctx: &DispatchContext<'_>,
        warehouse: &DocumentIndex,
    ) -> Result<(), CollectorError> {
        self.retire(index);
        // An unpaired opener covers only itself, as in `DocumentIndex::subtree`.
        let closer = warehouse.pair_of(index).filter(|&c| c > index);

        match token.kind() {
            "bullet_list_open" | "ordered_list_open" => {
                if let Some(closer) = closer {
                    self.lists.push((closer, token.kind() == "ordered_list_open"));
                }
            }
            "list_item_open" => {
                let slot = if self.items.is_full() {
                    self.items.mark_truncated();
                    None
                } else {
                    let ordered = self.lists.last().is_some_and(|&(_, ordered)| ordered);
                    self.items.push(ListItem {
                        depth: self.lists.len().max(1),
                        ordered,
                        text: String::new(),
                        task: None,
                        line: warehouse.line_of(index),
                    });
                    Some(self.items.len() - 1)
                };
                if let Some(closer) = closer {
                    self.open_items.push((closer, slot));
                }
            }
            "inline" => {
                if let Some(item) = self.current() {
                    if item.text.is_empty() {
                        item.text = token.content().trim().to_string();
                    }
                }
            }
            "task_marker" => {
                let checked = token.attr("checked") == Some("true");
                if let Some(item) = self.current() {
                    item.task.get_or_insert(checked);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finalize(
        &mut self,
        _warehouse: &DocumentIndex,
        _deadline: &Deadline,
    ) -> Result<CollectorOutput, CollectorError> {
        self.lists.clear();
        self.open_items.clear();
        Ok(self.items.take_output().map_err(anyhow::Error::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assay_core::{Warehouse, WarehouseConfig};

    fn item(text: &str, line: usize) -> Vec<Token> {
        vec![
            Token::new("list_item_open", 1).with_map(line, line + 1),
            Token::new("inline", 0).with_content(text).with_map(line, line + 1),
        ]
    }

    fn run(tokens: &[Token]) -> Vec<(u64, bool, String)> {
        let mut warehouse = Warehouse::new(tokens, "", WarehouseConfig::strict()).unwrap();
        warehouse
            .register(ListItemsCollector::new(&CapsConfig::default()))
            .unwrap();
        let output = &warehouse.dispatch_all().unwrap().results["list_items"];
        output
            .items
            .iter()
            .map(|i| {
                (
                    i["depth"].as_u64().unwrap(),
                    i["ordered"].as_bool().unwrap(),
                    i["text"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn test_depth_tracked_across_nesting() {
        let mut tokens = vec![Token::new("bullet_list_open", 1).with_map(0, 4)];
        tokens.extend(item("outer", 0));
        tokens.push(Token::new("ordered_list_open", 1).with_map(1, 3));
        tokens.extend(item("inner", 1));
        tokens.push(Token::new("list_item_close", -1));
        tokens.push(Token::new("ordered_list_close", -1));
        tokens.push(Token::new("list_item_close", -1));
        tokens.extend(item("sibling", 3));
        tokens.push(Token::new("list_item_close", -1));
        tokens.push(Token::new("bullet_list_close", -1));
        tokens.push(Token::new("inline", 0).with_content("after").with_map(5, 6));

        assert_eq!(
            run(&tokens),
            vec![
                (1, false, "outer".to_string()),
                (2, true, "inner".to_string()),
                (1, false, "sibling".to_string()),
            ]
        );
    }

    #[test]
    fn test_dangling_closers_ignored() {
        let mut tokens = vec![
            Token::new("list_item_close", -1),
            Token::new("bullet_list_open", 1).with_map(0, 2),
        ];
        tokens.extend(item("kept", 0));
        tokens.push(Token::new("ordered_list_close", -1));
        tokens.extend(item("nested", 1));
        tokens.push(Token::new("list_item_close", -1));
        tokens.push(Token::new("list_item_close", -1));
        tokens.push(Token::new("bullet_list_close", -1));

        assert_eq!(
            run(&tokens),
            vec![(1, false, "kept".to_string()), (1, false, "nested".to_string())]
        );
    }

    #[test]
    fn test_text_after_list_not_attached() {
        let mut tokens = vec![Token::new("bullet_list_open", 1).with_map(0, 1)];
        tokens.push(Token::new("list_item_open", 1).with_map(0, 1));
        tokens.push(Token::new("paragraph_open", 1).with_map(0, 1));
        tokens.push(Token::new("paragraph_close", -1));
        tokens.push(Token::new("list_item_close", -1));
        tokens.push(Token::new("bullet_list_close", -1));
        tokens.push(Token::new("inline", 0).with_content("after").with_map(2, 3));

        assert_eq!(run(&tokens), vec![(1, false, String::new())]);
    }
}
