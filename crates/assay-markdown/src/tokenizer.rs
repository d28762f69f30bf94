//! pulldown-cmark event stream to markdown-it style tokens

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag};
use std::ops::Range;

use crate::lines::LineIndex;
use crate::token::MarkdownToken;

/// Extensions enabled for every document
pub fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
}

/// Tokenize markdown source
pub fn tokenize(source: &str) -> Vec<MarkdownToken> {
    let mut tokenizer = Tokenizer::new(source);
    for (event, range) in Parser::new_ext(source, parser_options()).into_offset_iter() {
        tokenizer.event(event, range);
    }
    let tokens = tokenizer.finish();
    tracing::debug!(bytes = source.len(), tokens = tokens.len(), "Tokenized markdown");
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Place {
    Block,
    Inline,
    Leaf,
    Skip,
}

/// An open pulldown-cmark tag, popped on the matching `End`
#[derive(Debug)]
struct Frame {
    kind: &'static str,
    tag: &'static str,
    markup: String,
    place: Place,
}

impl Frame {
    fn new(kind: &'static str, tag: &'static str, markup: impl Into<String>, place: Place) -> Self {
        Self {
            kind,
            tag,
            markup: markup.into(),
            place,
        }
    }

    fn closer(self) -> MarkdownToken {
        MarkdownToken::new(format!("{}_close", self.kind), -1)
            .with_tag(self.tag)
            .with_markup(self.markup)
    }
}

/// Inline tokens waiting for their `inline` header
#[derive(Debug, Default)]
struct InlineRun {
    tokens: Vec<MarkdownToken>,
    text: String,
    lines: Option<(usize, usize)>,
}

impl InlineRun {
    fn touch(&mut self, map: (usize, usize)) {
        self.lines = Some(match self.lines {
            Some((start, end)) => (start.min(map.0), end.max(map.1)),
            None => map,
        });
    }
}

/// Alt text being gathered for an image
#[derive(Debug)]
struct ImageCapture {
    depth: usize,
    token: MarkdownToken,
}

struct Tokenizer<'s> {
    source: &'s str,
    lines: LineIndex,
    out: Vec<MarkdownToken>,
    frames: Vec<Frame>,
    inline: InlineRun,
    leaf: Option<MarkdownToken>,
    image: Option<ImageCapture>,
    in_table_head: bool,
    tbody_open: bool,
}

impl<'s> Tokenizer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            lines: LineIndex::new(source),
            out: Vec::new(),
            frames: Vec::new(),
            inline: InlineRun::default(),
            leaf: None,
            image: None,
            in_table_head: false,
            tbody_open: false,
        }
    }

    fn finish(mut self) -> Vec<MarkdownToken> {
        while !self.frames.is_empty() {
            self.end();
        }
        self.flush_inline();
        self.out
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        if self.capture_image(&event) {
            return;
        }

        match event {
            Event::Start(tag) => self.start(tag, range),
            Event::End(_) => self.end(),
            Event::Text(text) => match self.leaf.as_mut() {
                Some(leaf) => leaf.content.push_str(&text),
                None => {
                    self.inline.text.push_str(&text);
                    self.push_inline(MarkdownToken::new("text", 0).with_content(text.to_string()), &range);
                }
            },
            Event::Code(code) => {
                self.inline.text.push_str(&code);
                let token = MarkdownToken::new("code_inline", 0)
                    .with_tag("code")
                    .with_markup("`")
                    .with_content(code.to_string());
                self.push_inline(token, &range);
            }
            Event::Html(html) => match self.leaf.as_mut() {
                Some(leaf) => leaf.content.push_str(&html),
                None => {
                    self.flush_inline();
                    let map = self.lines.map(&range);
                    self.out
                        .push(MarkdownToken::new("html_block", 0).with_map(map).with_content(html.to_string()));
                }
            },
            Event::InlineHtml(html) => {
                self.push_inline(MarkdownToken::new("html_inline", 0).with_content(html.to_string()), &range);
            }
            Event::FootnoteReference(label) => {
                let token = MarkdownToken::new("footnote_ref", 0).with_attr("label", label.to_string());
                self.push_inline(token, &range);
            }
            Event::SoftBreak => {
                self.inline.text.push('\n');
                self.push_inline(MarkdownToken::new("softbreak", 0), &range);
            }
            Event::HardBreak => {
                self.inline.text.push('\n');
                self.push_inline(MarkdownToken::new("hardbreak", 0).with_tag("br"), &range);
            }
            Event::Rule => {
                self.flush_inline();
                let map = self.lines.map(&range);
                let markup = leading_run(&self.source[range], &['-', '*', '_']);
                self.out
                    .push(MarkdownToken::new("hr", 0).with_tag("hr").with_map(map).with_markup(markup));
            }
            Event::TaskListMarker(checked) => {
                let token = MarkdownToken::new("task_marker", 0).with_attr("checked", checked.to_string());
                self.push_inline(token, &range);
            }
            _ => {}
        }
    }

    /// Route events into a pending image's alt text. Returns whether the
    /// event was consumed.
    fn capture_image(&mut self, event: &Event<'_>) -> bool {
        let Some(capture) = self.image.as_mut() else {
            return false;
        };
        match event {
            Event::Start(_) => capture.depth += 1,
            Event::End(_) if capture.depth > 0 => capture.depth -= 1,
            Event::End(_) => {
                if let Some(done) = self.image.take() {
                    self.inline.tokens.push(done.token);
                }
            }
            Event::Text(text) | Event::Code(text) => {
                capture.token.content.push_str(text);
                self.inline.text.push_str(text);
            }
            Event::SoftBreak | Event::HardBreak => capture.token.content.push(' '),
            _ => {}
        }
        true
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>) {
        match tag {
            Tag::Paragraph => self.open_block(Frame::new("paragraph", "p", "", Place::Block), &range, None),
            Tag::Heading { level, .. } => {
                let n = level as usize;
                let frame = Frame::new("heading", HEADING_TAGS[n.clamp(1, 6) - 1], "#".repeat(n), Place::Block);
                self.open_block(frame, &range, None);
            }
            Tag::BlockQuote(_) => {
                self.open_block(Frame::new("blockquote", "blockquote", ">", Place::Block), &range, None)
            }
            Tag::CodeBlock(kind) => {
                self.flush_inline();
                let map = self.lines.map(&range);
                let token = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let markup = leading_run(&self.source[range.clone()], &['`', '~']);
                        MarkdownToken::new("fence", 0).with_info(info.to_string()).with_markup(markup)
                    }
                    CodeBlockKind::Indented => MarkdownToken::new("code_block", 0),
                };
                self.leaf = Some(token.with_tag("code").with_map(map));
                self.frames.push(Frame::new("code", "code", "", Place::Leaf));
            }
            Tag::HtmlBlock => {
                self.flush_inline();
                let map = self.lines.map(&range);
                self.leaf = Some(MarkdownToken::new("html_block", 0).with_map(map));
                self.frames.push(Frame::new("html_block", "", "", Place::Leaf));
            }
            Tag::List(Some(start)) => {
                let frame = Frame::new("ordered_list", "ol", ".", Place::Block);
                self.open_block(frame, &range, Some(("start", start.to_string())));
            }
            Tag::List(None) => {
                let markup = leading_run(&self.source[range.clone()], &['-', '*', '+']);
                self.open_block(Frame::new("bullet_list", "ul", markup, Place::Block), &range, None);
            }
            Tag::Item => self.open_block(Frame::new("list_item", "li", "", Place::Block), &range, None),
            Tag::FootnoteDefinition(label) => {
                let frame = Frame::new("footnote", "", "", Place::Block);
                self.open_block(frame, &range, Some(("label", label.to_string())));
            }
            Tag::Table(_) => {
                self.tbody_open = false;
                self.open_block(Frame::new("table", "table", "", Place::Block), &range, None);
            }
            Tag::TableHead => {
                self.open_block(Frame::new("thead", "thead", "", Place::Block), &range, None);
                self.out
                    .push(MarkdownToken::new("tr_open", 1).with_tag("tr").with_map(self.lines.map(&range)));
                self.in_table_head = true;
            }
            Tag::TableRow => {
                if !self.in_table_head && !self.tbody_open {
                    self.out
                        .push(MarkdownToken::new("tbody_open", 1).with_tag("tbody").with_map(self.lines.map(&range)));
                    self.tbody_open = true;
                }
                self.open_block(Frame::new("tr", "tr", "", Place::Block), &range, None);
            }
            Tag::TableCell => {
                let kind = if self.in_table_head { "th" } else { "td" };
                self.open_block(Frame::new(kind, kind, "", Place::Block), &range, None);
            }
            Tag::Emphasis => self.open_inline(Frame::new("em", "em", "*", Place::Inline), &range),
            Tag::Strong => self.open_inline(Frame::new("strong", "strong", "**", Place::Inline), &range),
            Tag::Strikethrough => self.open_inline(Frame::new("s", "s", "~~", Place::Inline), &range),
            Tag::Link { dest_url, title, .. } => {
                let token = with_title(
                    MarkdownToken::new("link_open", 1)
                        .with_tag("a")
                        .with_attr("href", dest_url.to_string()),
                    &title,
                );
                self.push_inline(token, &range);
                self.frames.push(Frame::new("link", "a", "", Place::Inline));
            }
            Tag::Image { dest_url, title, .. } => {
                self.inline.touch(self.lines.map(&range));
                let token = with_title(
                    MarkdownToken::new("image", 0)
                        .with_tag("img")
                        .with_attr("src", dest_url.to_string()),
                    &title,
                );
                self.image = Some(ImageCapture { depth: 0, token });
            }
            _ => self.frames.push(Frame::new("", "", "", Place::Skip)),
        }
    }

    fn end(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        match frame.place {
            Place::Skip => {}
            Place::Leaf => {
                if let Some(leaf) = self.leaf.take() {
                    self.out.push(leaf);
                }
            }
            Place::Inline => self.inline.tokens.push(frame.closer()),
            Place::Block => {
                self.flush_inline();
                match frame.kind {
                    "thead" => {
                        self.out.push(MarkdownToken::new("tr_close", -1).with_tag("tr"));
                        self.in_table_head = false;
                    }
                    "table" if self.tbody_open => {
                        self.out.push(MarkdownToken::new("tbody_close", -1).with_tag("tbody"));
                        self.tbody_open = false;
                    }
                    _ => {}
                }
                self.out.push(frame.closer());
            }
        }
    }

    fn open_block(&mut self, frame: Frame, range: &Range<usize>, attr: Option<(&str, String)>) {
        self.flush_inline();
        let mut token = MarkdownToken::new(format!("{}_open", frame.kind), 1)
            .with_tag(frame.tag)
            .with_markup(frame.markup.clone())
            .with_map(self.lines.map(range));
        if let Some((name, value)) = attr {
            token = token.with_attr(name, value);
        }
        self.out.push(token);
        self.frames.push(frame);
    }

    fn open_inline(&mut self, frame: Frame, range: &Range<usize>) {
        let token = MarkdownToken::new(format!("{}_open", frame.kind), 1)
            .with_tag(frame.tag)
            .with_markup(frame.markup.clone());
        self.push_inline(token, range);
        self.frames.push(frame);
    }

    fn push_inline(&mut self, token: MarkdownToken, range: &Range<usize>) {
        self.inline.touch(self.lines.map(range));
        self.inline.tokens.push(token);
    }

    /// Emit the pending `inline` header followed by its tokens
    fn flush_inline(&mut self) {
        let run = std::mem::take(&mut self.inline);
        if run.tokens.is_empty() {
            return;
        }
        let mut header = MarkdownToken::new("inline", 0).with_content(run.text);
        if let Some(map) = run.lines {
            header = header.with_map(map);
        }
        self.out.push(header);
        self.out.extend(run.tokens);
    }
}

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

fn with_title(token: MarkdownToken, title: &CowStr<'_>) -> MarkdownToken {
    if title.is_empty() {
        token
    } else {
        token.with_attr("title", title.to_string())
    }
}

/// Leading run of marker characters after indentation, e.g. the fence of a
/// code block
fn leading_run(text: &str, markers: &[char]) -> String {
    let trimmed = text.trim_start();
    let Some(first) = trimmed.chars().next().filter(|c| markers.contains(c)) else {
        return String::new();
    };
    trimmed.chars().take_while(|&c| c == first).collect()
}
