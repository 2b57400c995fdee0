use std::fmt::Write as _;

use aggregator_core::ExtractedChapter;
use chrono::{DateTime, Utc};

use crate::extract::UNKNOWN_NOVEL;
use crate::filename::document_filename;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub filename: String,
    pub html: String,
    pub chapter_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("no chapters to assemble")]
    NoChapters,
}

/// Build the single-file reader for `chapters`, in the given order.
///
/// The novel title comes from the first chapter. Titles are escaped;
/// chapter content is embedded as extracted.
pub fn assemble(
    chapters: &[ExtractedChapter],
    generated_at: DateTime<Utc>,
) -> Result<Document, AssembleError> {
    let first = chapters.first().ok_or(AssembleError::NoChapters)?;
    let title = if first.novel_title.trim().is_empty() {
        UNKNOWN_NOVEL.to_string()
    } else {
        first.novel_title.clone()
    };
    let filename = document_filename(
        &title,
        chapters.iter().map(|c| c.chapter_title.as_str()),
        chapters.len(),
        generated_at,
    );

    let html = render(&title, chapters, generated_at);
    Ok(Document {
        title,
        filename,
        html,
        chapter_count: chapters.len(),
    })
}

fn render(title: &str, chapters: &[ExtractedChapter], generated_at: DateTime<Utc>) -> String {
    let title = escape_html(title);
    let count = chapters.len();
    let generated = generated_at.format("%Y-%m-%d %H:%M UTC");

    let mut toc = String::new();
    let mut body = String::new();
    for (index, chapter) in chapters.iter().enumerate() {
        let n = index + 1;
        let chapter_title = escape_html(&chapter.chapter_title);
        let _ = writeln!(
            toc,
            r##"            <a href="#chapter-{n}" class="chapter-item" data-chapter="{n}">{n}. {chapter_title}</a>"##
        );
        let _ = write!(
            body,
            r#"        <section class="chapter">
            <h2 class="chapter-title" id="chapter-{n}">{chapter_title}</h2>
            <div class="chapter-content">
{content}
            </div>
        </section>
"#,
            content = chapter.content_html
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <nav class="navbar">
        <div class="nav-brand">{title}</div>
        <div class="nav-stats">{count} chapters</div>
        <button class="menu-toggle" type="button">Chapters</button>
    </nav>
    <div class="progress-bar" id="progress-bar"></div>
    <aside class="sidebar" id="sidebar">
        <div class="sidebar-header">
            <div class="sidebar-title">{title}</div>
            <div class="sidebar-meta">{count} chapters, generated {generated}</div>
        </div>
        <nav class="chapter-list">
{toc}        </nav>
    </aside>
    <main class="main-content" id="main-content">
        <h1 class="book-title">{title}</h1>
        <div class="metadata">Generated on {generated}. {count} chapters.</div>
{body}        <div class="metadata">End of {title}</div>
    </main>
    <div class="nav-controls">
        <button class="nav-btn" id="prev-btn" type="button" title="Previous chapter">&lsaquo;</button>
        <button class="nav-btn" id="next-btn" type="button" title="Next chapter">&rsaquo;</button>
    </div>
    <script>{SCRIPT}</script>
</body>
</html>
"#
    )
}

/// Escape text for element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"
        :root {
            --primary-bg: #ffffff;
            --secondary-bg: #f8f9fa;
            --text-primary: #2c3e50;
            --text-secondary: #6c757d;
            --accent: #007bff;
            --border: #dee2e6;
            --navbar-height: 60px;
        }
        @media (prefers-color-scheme: dark) {
            :root {
                --primary-bg: #1a1a1a;
                --secondary-bg: #2d2d2d;
                --text-primary: #e0e0e0;
                --text-secondary: #a0a0a0;
                --accent: #4dabf7;
                --border: #404040;
            }
        }
        * { box-sizing: border-box; }
        body {
            margin: 0;
            font-family: Georgia, "Times New Roman", serif;
            line-height: 1.8;
            color: var(--text-primary);
            background: var(--primary-bg);
        }
        .navbar {
            position: fixed; top: 0; left: 0; right: 0;
            height: var(--navbar-height);
            display: flex; align-items: center; justify-content: space-between;
            padding: 0 20px;
            background: var(--secondary-bg);
            border-bottom: 1px solid var(--border);
            z-index: 1000;
        }
        .nav-brand { font-weight: bold; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }
        .nav-stats { color: var(--text-secondary); font-size: 0.9em; }
        .menu-toggle, .nav-btn {
            background: var(--accent); color: #fff; border: none; border-radius: 6px;
            padding: 8px 14px; cursor: pointer;
        }
        .progress-bar {
            position: fixed; top: var(--navbar-height); left: 0;
            height: 3px; width: 0; background: var(--accent); z-index: 1001;
        }
        .sidebar {
            position: fixed; top: var(--navbar-height); left: -320px; bottom: 0;
            width: 320px; overflow-y: auto;
            background: var(--secondary-bg); border-right: 1px solid var(--border);
            transition: left 0.3s ease; z-index: 999;
        }
        .sidebar.open { left: 0; }
        .sidebar-header { padding: 20px; border-bottom: 1px solid var(--border); }
        .sidebar-title { font-weight: bold; }
        .sidebar-meta { color: var(--text-secondary); font-size: 0.85em; }
        .chapter-item {
            display: block; padding: 10px 20px;
            color: var(--text-primary); text-decoration: none;
            border-bottom: 1px solid var(--border);
        }
        .chapter-item.active { background: var(--accent); color: #fff; }
        .main-content {
            max-width: 800px; margin: 0 auto;
            padding: calc(var(--navbar-height) + 40px) 20px 120px;
            transition: margin-left 0.3s ease;
        }
        .main-content.sidebar-open { margin-left: 340px; }
        .book-title { text-align: center; }
        .metadata {
            text-align: center; color: var(--text-secondary); font-size: 0.9em;
            margin: 30px 0; padding: 15px; border: 1px solid var(--border); border-radius: 8px;
        }
        .chapter-title {
            margin-top: 60px; padding-bottom: 10px;
            border-bottom: 2px solid var(--accent);
            scroll-margin-top: calc(var(--navbar-height) + 20px);
        }
        .chapter-content p { margin: 1em 0; text-align: justify; }
        .nav-controls { position: fixed; right: 20px; bottom: 20px; display: flex; gap: 10px; }
        .nav-btn:disabled { opacity: 0.4; cursor: default; }
        @media (max-width: 1100px) {
            .main-content.sidebar-open { margin-left: auto; }
        }
        @media print {
            .navbar, .sidebar, .nav-controls, .progress-bar { display: none; }
            .main-content { padding-top: 0; }
        }
    "#;

const SCRIPT: &str = r#"
        (function () {
            var headings = document.querySelectorAll('.chapter-title');
            var items = document.querySelectorAll('.chapter-item');
            var total = headings.length;
            var current = 1;
            var sidebarOpen = false;
            var sidebar = document.getElementById('sidebar');
            var main = document.getElementById('main-content');
            var prev = document.getElementById('prev-btn');
            var next = document.getElementById('next-btn');

            function toggleSidebar() {
                sidebarOpen = !sidebarOpen;
                sidebar.classList.toggle('open', sidebarOpen);
                if (window.innerWidth > 1100) {
                    main.classList.toggle('sidebar-open', sidebarOpen);
                }
            }

            function refresh() {
                prev.disabled = current <= 1;
                next.disabled = current >= total;
                items.forEach(function (item, i) {
                    item.classList.toggle('active', i + 1 === current);
                });
            }

            function go(n) {
                if (n < 1 || n > total) { return; }
                current = n;
                var target = document.getElementById('chapter-' + n);
                if (target) { target.scrollIntoView({ behavior: 'smooth', block: 'start' }); }
                refresh();
                if (window.innerWidth <= 1100 && sidebarOpen) { setTimeout(toggleSidebar, 300); }
            }

            function onScroll() {
                var height = document.documentElement.scrollHeight - window.innerHeight;
                var pct = height > 0 ? (window.pageYOffset / height) * 100 : 0;
                document.getElementById('progress-bar').style.width = Math.min(100, Math.max(0, pct)) + '%';
                var pos = window.pageYOffset + 100;
                for (var i = headings.length - 1; i >= 0; i--) {
                    if (headings[i].offsetTop <= pos) {
                        if (i + 1 !== current) { current = i + 1; refresh(); }
                        break;
                    }
                }
            }

            document.querySelector('.menu-toggle').addEventListener('click', toggleSidebar);
            prev.addEventListener('click', function () { go(current - 1); });
            next.addEventListener('click', function () { go(current + 1); });
            items.forEach(function (item) {
                item.addEventListener('click', function (e) {
                    e.preventDefault();
                    go(parseInt(item.getAttribute('data-chapter'), 10));
                });
            });

            var pending;
            window.addEventListener('scroll', function () {
                if (pending) { clearTimeout(pending); }
                pending = setTimeout(onScroll, 16);
            });

            document.addEventListener('keydown', function (e) {
                if (e.ctrlKey && e.key === 'ArrowLeft') { e.preventDefault(); go(current - 1); }
                else if (e.ctrlKey && e.key === 'ArrowRight') { e.preventDefault(); go(current + 1); }
                else if (e.key === 'Escape' && sidebarOpen) { toggleSidebar(); }
            });

            document.addEventListener('click', function (e) {
                if (sidebarOpen && window.innerWidth <= 1100
                    && !e.target.closest('.sidebar') && !e.target.closest('.menu-toggle')) {
                    toggleSidebar();
                }
            });

            onScroll();
            refresh();
        })();
    "#;
