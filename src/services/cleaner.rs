// src/services/cleaner.rs

//! HTML to Markdown cleaner.
//!
//! Drops page chrome and renders the remaining structure as light
//! Markdown: headings, paragraphs, list items, code blocks and inline
//! links. Images are ignored.

use ego_tree::iter::Edge;
use scraper::{ElementRef, Html, Node};

use crate::utils::collapse_whitespace;

/// Elements removed together with their content.
const DROPPED: &[&str] = &[
    "script", "style", "nav", "footer", "iframe", "noscript", "svg", "header", "aside", "form",
    "template", "head",
];

/// Stateless HTML cleaner.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cleaner;

impl Cleaner {
    pub fn new() -> Self {
        Self
    }

    /// Convert raw HTML into cleaned Markdown. Empty input gives an empty string.
    ///
    /// The tree is walked with an explicit stack, so nesting depth is bounded
    /// only by memory.
    pub fn clean(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }
        let document = Html::parse_document(html);
        let mut writer = MarkdownWriter::default();
        for edge in document.root_element().traverse() {
            match edge {
                Edge::Open(node) => match node.value() {
                    Node::Text(text) => writer.text(text),
                    Node::Element(_) => {
                        if let Some(el) = ElementRef::wrap(node) {
                            writer.open(el);
                        }
                    }
                    _ => {}
                },
                Edge::Close(node) => {
                    if node.value().is_element() {
                        writer.close();
                    }
                }
            }
        }
        writer.finish()
    }
}

/// One open element on the writer's stack.
enum Frame<'a> {
    /// Dropped or already rendered; its subtree is ignored.
    Skipped,
    /// Generic container; separates blocks on both sides.
    Container,
    /// Heading, paragraph or list item collected into a single block.
    Block { prefix: &'static str, buf: String },
    /// Inline markup, decorated when closed.
    Inline { el: ElementRef<'a>, buf: String },
}

#[derive(Default)]
struct MarkdownWriter<'a> {
    blocks: Vec<String>,
    inline: String,
    frames: Vec<Frame<'a>>,
    skipping: usize,
}

impl<'a> MarkdownWriter<'a> {
    fn text(&mut self, text: &str) {
        if self.skipping == 0 {
            self.buffer().push_str(text);
        }
    }

    fn open(&mut self, el: ElementRef<'a>) {
        let name = el.value().name();
        if self.skipping > 0 || DROPPED.contains(&name) || name == "img" {
            self.skip();
            return;
        }
        if self.in_inline() {
            self.frames.push(Frame::Inline {
                el,
                buf: String::new(),
            });
            return;
        }
        let frame = match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                self.flush();
                Frame::Block {
                    prefix: &"######"[..level.clamp(1, 6)],
                    buf: String::new(),
                }
            }
            "p" | "blockquote" | "figcaption" | "li" => {
                self.flush();
                let prefix = match name {
                    "blockquote" => ">",
                    "li" => "-",
                    _ => "",
                };
                Frame::Block {
                    prefix,
                    buf: String::new(),
                }
            }
            "pre" => {
                self.flush();
                let code = el.text().collect::<String>();
                let code = code.trim_matches('\n');
                if !code.trim().is_empty() {
                    self.blocks.push(format!("```\n{}\n```", code));
                }
                self.skip();
                return;
            }
            "br" => {
                self.inline.push(' ');
                self.skip();
                return;
            }
            "hr" => {
                self.flush();
                self.blocks.push("---".to_string());
                self.skip();
                return;
            }
            "a" | "strong" | "b" | "em" | "i" | "code" | "span" => Frame::Inline {
                el,
                buf: String::new(),
            },
            _ => {
                self.flush();
                Frame::Container
            }
        };
        self.frames.push(frame);
    }

    fn close(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        match frame {
            Frame::Skipped => self.skipping -= 1,
            Frame::Container => self.flush(),
            Frame::Block { prefix, buf } => {
                let text = collapse_whitespace(&buf);
                if !text.is_empty() {
                    self.blocks.push(if prefix.is_empty() {
                        text
                    } else {
                        format!("{} {}", prefix, text)
                    });
                }
            }
            Frame::Inline { el, buf } => {
                let rendered = decorate(el, collapse_whitespace(&buf));
                if self.in_inline() {
                    let parent = self.buffer();
                    parent.push(' ');
                    parent.push_str(&rendered);
                    parent.push(' ');
                } else {
                    self.inline.push_str(&rendered);
                }
            }
        }
    }

    fn skip(&mut self) {
        self.skipping += 1;
        self.frames.push(Frame::Skipped);
    }

    fn in_inline(&self) -> bool {
        matches!(
            self.frames.last(),
            Some(Frame::Block { .. } | Frame::Inline { .. })
        )
    }

    /// Where text currently accumulates.
    fn buffer(&mut self) -> &mut String {
        match self.frames.last_mut() {
            Some(Frame::Block { buf, .. } | Frame::Inline { buf, .. }) => buf,
            _ => &mut self.inline,
        }
    }

    fn flush(&mut self) {
        let text = collapse_whitespace(&self.inline);
        self.inline.clear();
        if !text.is_empty() {
            self.blocks.push(text);
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.blocks.join("\n\n")
    }
}

/// Apply link and emphasis markup to already-rendered inline text.
fn decorate(el: ElementRef<'_>, text: String) -> String {
    if text.is_empty() {
        return text;
    }
    match el.value().name() {
        "a" => match el.value().attr("href") {
            Some(href) if !href.starts_with("javascript:") => format!("[{}]({})", text, href),
            _ => text,
        },
        "strong" | "b" => format!("**{}**", text),
        "em" | "i" => format!("*{}*", text),
        "code" => format!("`{}`", text),
        _ => text,
    }
}
