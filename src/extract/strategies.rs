//! The extraction strategy cascade.
//!
//! Each strategy scans the same parsed document with a different structural
//! heuristic and returns zero or more candidate posts. None of them share
//! state and none of them fail: an item a strategy cannot parse is simply
//! skipped. Priority ordering lives in [`STRATEGIES`]; the driver in the
//! parent module handles dedup between them.

use super::{MIN_TITLE_CHARS, UNKNOWN_AUTHOR, parse_number};
use crate::models::Post;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Shared read-only view each strategy works from.
pub(super) struct StrategyContext<'a> {
    pub document: &'a Html,
    pub base_url: &'a Url,
    pub link_pattern: &'a Regex,
    pub page: u32,
    pub crawl_time: &'a str,
}

pub(super) type Strategy = fn(&StrategyContext<'_>) -> Vec<Post>;

/// The cascade, most structurally specific first.
pub(super) const STRATEGIES: &[(&str, Strategy)] = &[
    ("canonical_container", canonical_container),
    ("broad_class_scan", broad_class_scan),
    ("link_pattern", link_pattern_scan),
    ("title_containers", title_containers),
    ("list_items", list_items),
    ("anchor_fallback", anchor_fallback),
];

static CANONICAL_ROWS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#articlelistnew div.articleh").unwrap());
static ARTICLE_ROWS: Lazy<Selector> = Lazy::new(|| Selector::parse("div.articleh").unwrap());
static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static TITLE_DIV_ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("div.title a").unwrap());
static DIVS_AND_SPANS: Lazy<Selector> = Lazy::new(|| Selector::parse("div, span").unwrap());
static LIST_ITEMS: Lazy<Selector> = Lazy::new(|| Selector::parse("li").unwrap());
static SPANS: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static READ_SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span.l1").unwrap());
static COMMENT_SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span.l2").unwrap());
static TITLE_SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span.l3").unwrap());
static AUTHOR_SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span.l4").unwrap());
static TIME_SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span.l5").unwrap());

static TITLE_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"title|l3").unwrap());
static LIST_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"list_item|post_item").unwrap());
static READ_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"read|click").unwrap());
static COMMENT_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"comment|reply").unwrap());
static AUTHOR_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"author|user").unwrap());
static TIME_CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"time|date").unwrap());

/// Rows inside the canonical `#articlelistnew` container, full field parse.
fn canonical_container(ctx: &StrategyContext<'_>) -> Vec<Post> {
    ctx.document
        .select(&CANONICAL_ROWS)
        .filter_map(|row| parse_article_row(row, ctx))
        .collect()
}

/// Every `div.articleh` anywhere in the document; catches rows the page
/// variant renders outside the canonical container.
fn broad_class_scan(ctx: &StrategyContext<'_>) -> Vec<Post> {
    ctx.document
        .select(&ARTICLE_ROWS)
        .filter_map(|row| parse_article_row(row, ctx))
        .collect()
}

/// Anchors whose href targets a post of this stock (`news,{id}`).
fn link_pattern_scan(ctx: &StrategyContext<'_>) -> Vec<Post> {
    ctx.document
        .select(&ANCHORS)
        .filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| ctx.link_pattern.is_match(href))
        })
        .filter_map(|a| bare_anchor_post(a, ctx))
        .collect()
}

/// `div.title` anchors plus any div/span whose class looks like a title
/// holder (`title`, `l3`).
fn title_containers(ctx: &StrategyContext<'_>) -> Vec<Post> {
    let mut posts: Vec<Post> = ctx
        .document
        .select(&TITLE_DIV_ANCHORS)
        .filter_map(|a| bare_anchor_post(a, ctx))
        .collect();

    for container in ctx.document.select(&DIVS_AND_SPANS) {
        let class_matches = container
            .value()
            .attr("class")
            .is_some_and(|class| TITLE_CLASS_RE.is_match(class));
        if !class_matches {
            continue;
        }
        if let Some(anchor) = container.select(&ANCHOR).next()
            && let Some(post) = bare_anchor_post(anchor, ctx)
        {
            posts.push(post);
        }
    }
    posts
}

/// `<li>` based layouts (`list_item`, `post_item`), with best-effort
/// engagement and byline fields from class-hinted spans.
fn list_items(ctx: &StrategyContext<'_>) -> Vec<Post> {
    let mut posts = Vec::new();
    for item in ctx.document.select(&LIST_ITEMS) {
        let class_matches = item
            .value()
            .attr("class")
            .is_some_and(|class| LIST_CLASS_RE.is_match(class));
        if !class_matches {
            continue;
        }
        let Some(anchor) = item.select(&ANCHOR).find(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| ctx.link_pattern.is_match(href))
        }) else {
            continue;
        };
        let title = element_text(anchor);
        if !valid_title(&title) {
            continue;
        }
        let Some(link) = resolve_href(anchor, ctx.base_url) else {
            continue;
        };
        posts.push(Post {
            title,
            link,
            read_count: class_hinted_text(item, &READ_CLASS_RE)
                .map(|t| parse_number(&t))
                .unwrap_or(0),
            comment_count: class_hinted_text(item, &COMMENT_CLASS_RE)
                .map(|t| parse_number(&t))
                .unwrap_or(0),
            author: class_hinted_text(item, &AUTHOR_CLASS_RE)
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            time: class_hinted_text(item, &TIME_CLASS_RE).unwrap_or_default(),
            page: ctx.page,
            crawl_time: ctx.crawl_time.to_string(),
        });
    }
    posts
}

/// Last resort: any anchor that points at a post page and carries enough
/// text to be a title.
fn anchor_fallback(ctx: &StrategyContext<'_>) -> Vec<Post> {
    ctx.document
        .select(&ANCHORS)
        .filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| href.contains("news,"))
        })
        .filter_map(|a| bare_anchor_post(a, ctx))
        .collect()
}

/// Full parse of one `div.articleh` row: title/link from `span.l3 a`,
/// counters from `l1`/`l2`, byline from `l4`/`l5`.
fn parse_article_row(row: ElementRef<'_>, ctx: &StrategyContext<'_>) -> Option<Post> {
    let title_span = row.select(&TITLE_SPAN).next()?;
    let anchor = title_span.select(&ANCHOR).next()?;
    let title = element_text(anchor);
    if !valid_title(&title) {
        return None;
    }
    let link = resolve_href(anchor, ctx.base_url)?;

    let span_text = |selector: &Selector| {
        row.select(selector)
            .next()
            .map(element_text)
            .unwrap_or_default()
    };

    Some(Post {
        title,
        link,
        read_count: parse_number(&span_text(&READ_SPAN)),
        comment_count: parse_number(&span_text(&COMMENT_SPAN)),
        author: {
            let author = span_text(&AUTHOR_SPAN);
            if author.is_empty() {
                UNKNOWN_AUTHOR.to_string()
            } else {
                author
            }
        },
        time: span_text(&TIME_SPAN),
        page: ctx.page,
        crawl_time: ctx.crawl_time.to_string(),
    })
}

/// Candidate from a lone anchor: title and link only, counters default 0.
fn bare_anchor_post(anchor: ElementRef<'_>, ctx: &StrategyContext<'_>) -> Option<Post> {
    let title = element_text(anchor);
    if !valid_title(&title) {
        return None;
    }
    Some(Post {
        title,
        link: resolve_href(anchor, ctx.base_url)?,
        read_count: 0,
        comment_count: 0,
        author: UNKNOWN_AUTHOR.to_string(),
        time: String::new(),
        page: ctx.page,
        crawl_time: ctx.crawl_time.to_string(),
    })
}

fn valid_title(title: &str) -> bool {
    !title.is_empty() && title.chars().count() > MIN_TITLE_CHARS
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Resolve an href to an absolute URL; handles relative and
/// protocol-relative forms. Unresolvable hrefs drop the candidate.
fn resolve_href(anchor: ElementRef<'_>, base_url: &Url) -> Option<String> {
    let href = anchor.value().attr("href")?;
    base_url.join(href).ok().map(|url| url.to_string())
}

/// Text of the first span whose class attribute matches the hint pattern.
fn class_hinted_text(scope: ElementRef<'_>, pattern: &Regex) -> Option<String> {
    scope
        .select(&SPANS)
        .find(|span| {
            span.value()
                .attr("class")
                .is_some_and(|class| pattern.is_match(class))
        })
        .map(element_text)
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_fixture<'a>(
        document: &'a Html,
        base_url: &'a Url,
        link_pattern: &'a Regex,
    ) -> StrategyContext<'a> {
        StrategyContext {
            document,
            base_url,
            link_pattern,
            page: 1,
            crawl_time: "2026-08-08 09:00:00",
        }
    }

    #[test]
    fn test_list_item_strategy_reads_class_hinted_fields() {
        let html = r#"
            <ul>
              <li class="post_item">
                <a href="/news,002594,42.html">机构调研密集，后市值得期待</a>
                <span class="read_num">2.5万</span>
                <span class="reply_num">103</span>
                <span class="user_nick">价值投资者</span>
                <span class="pub_time">08-06 09:30</span>
              </li>
              <li class="nav_item"><a href="/news,002594,43.html">导航栏里的很长的无关链接</a></li>
            </ul>
        "#;
        let document = Html::parse_document(html);
        let base_url = Url::parse("https://guba.eastmoney.com").unwrap();
        let pattern = Regex::new("news,002594").unwrap();
        let ctx = context_fixture(&document, &base_url, &pattern);

        let posts = list_items(&ctx);
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.title, "机构调研密集，后市值得期待");
        assert_eq!(post.read_count, 25_000);
        assert_eq!(post.comment_count, 103);
        assert_eq!(post.author, "价值投资者");
        assert_eq!(post.time, "08-06 09:30");
    }

    #[test]
    fn test_link_pattern_ignores_other_stocks() {
        let html = r#"
            <a href="/news,002594,1.html">这是本股的一条长标题帖子</a>
            <a href="/news,600519,2.html">这是别的股票的长标题帖子</a>
        "#;
        let document = Html::parse_document(html);
        let base_url = Url::parse("https://guba.eastmoney.com").unwrap();
        let pattern = Regex::new("news,002594").unwrap();
        let ctx = context_fixture(&document, &base_url, &pattern);

        let posts = link_pattern_scan(&ctx);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "这是本股的一条长标题帖子");
    }

    #[test]
    fn test_anchor_fallback_requires_post_shaped_href() {
        let html = r#"
            <a href="/about.html">关于我们的很长的介绍页面链接</a>
            <a href="/news,600519,2.html">别的股票也能被兜底策略捡起</a>
        "#;
        let document = Html::parse_document(html);
        let base_url = Url::parse("https://guba.eastmoney.com").unwrap();
        let pattern = Regex::new("news,002594").unwrap();
        let ctx = context_fixture(&document, &base_url, &pattern);

        let posts = anchor_fallback(&ctx);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "别的股票也能被兜底策略捡起");
    }

    #[test]
    fn test_rows_without_title_span_are_skipped() {
        let html = r#"
            <div id="articlelistnew">
              <div class="articleh"><span class="l1">100</span></div>
            </div>
        "#;
        let document = Html::parse_document(html);
        let base_url = Url::parse("https://guba.eastmoney.com").unwrap();
        let pattern = Regex::new("news,002594").unwrap();
        let ctx = context_fixture(&document, &base_url, &pattern);
        assert!(canonical_container(&ctx).is_empty());
    }
}
