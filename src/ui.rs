//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from console state ([`App`]) and
//! input handling ([`crate::input`]).
//!
//! ## For contributors
//!
//! * Layout: feed list and detail pane side by side, the activity log under
//!   them, then the prompt line and the status bar.
//! * The prompt line is always reserved so the layout does not jump when a
//!   dialog opens.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::admin::dialog::Step;
use crate::app::{App, Mode};
use crate::feed::Feed;

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [main_area, log_area, prompt_area, status_area] = Layout::vertical([
        Constraint::Min(6),
        Constraint::Length(8),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let [list_area, detail_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(main_area);

    draw_feed_list(app, frame, list_area);
    draw_detail(app, frame, detail_area);
    draw_log(app, frame, log_area);
    draw_prompt(app, frame, prompt_area);
    draw_status_bar(app, frame, status_area);
}

fn draw_feed_list(app: &mut App, frame: &mut Frame, area: Rect) {
    let list_items: Vec<ListItem> = app
        .feeds
        .iter()
        .map(|feed| {
            let version = feed.last_observed_version.as_deref().unwrap_or("-");
            let line = Line::from(vec![
                Span::styled(&feed.key, Style::default().fg(Color::White)),
                Span::raw("  "),
                Span::styled(version.to_string(), Style::default().fg(Color::Cyan)),
                Span::raw("  "),
                Span::styled(
                    format!("[{}]", feed.subscriber_count()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(list_items)
        .block(Block::default().title(" Feeds ").borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::DarkGray))
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn draw_detail(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default().title(" Details ").borders(Borders::ALL);
    let lines = match app.selected_feed() {
        Some(feed) => detail_lines(feed),
        None => vec![Line::from(Span::styled(
            "No feeds yet. Press `a` to add one.",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn detail_lines(feed: &Feed) -> Vec<Line<'_>> {
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
    let ids = |set: &std::collections::BTreeSet<i64>| {
        if set.is_empty() {
            "none".to_string()
        } else {
            set.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
        }
    };

    vec![
        Line::from(vec![label("title    "), Span::raw(&feed.title)]),
        Line::from(vec![label("repo     "), Span::raw(&feed.repo)]),
        Line::from(vec![label("link     "), Span::raw(&feed.link)]),
        Line::from(vec![
            label("version  "),
            Span::raw(feed.last_observed_version.as_deref().unwrap_or("never seen")),
        ]),
        Line::from(vec![
            label("filters  "),
            if feed.asset_filters.is_empty() {
                Span::styled("none (feed is skipped)", Style::default().fg(Color::Red))
            } else {
                Span::raw(feed.asset_filters.join("  "))
            },
        ]),
        Line::from(vec![label("users    "), Span::raw(ids(&feed.subscribed_users))]),
        Line::from(vec![label("channels "), Span::raw(ids(&feed.subscribed_channels))]),
    ]
}

fn draw_log(app: &App, frame: &mut Frame, area: Rect) {
    // Show the tail that fits inside the borders.
    let visible = area.height.saturating_sub(2) as usize;
    let skip = app.log.len().saturating_sub(visible);
    let lines: Vec<Line> = app.log.iter().skip(skip).map(|l| Line::raw(l.as_str())).collect();
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().title(" Activity ").borders(Borders::ALL)),
        area,
    );
}

fn draw_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let Some(prompt) = app.prompt() else {
        return;
    };
    let waiting = matches!(&app.mode, Mode::Dialog(d) if d.step() == Step::CheckingRepo);
    let mut spans = vec![
        Span::styled(format!("{prompt} "), Style::default().fg(Color::Cyan)),
        Span::raw(&app.input),
    ];
    if !waiting {
        spans.push(Span::styled("█", Style::default().fg(Color::Gray)));
    }
    let line = Line::from(spans);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let keys = if app.is_typing() {
        "  Enter: submit  Esc: cancel"
    } else {
        "  q: quit  c: check  a: add  :: command  r: refresh  ↑/↓: scroll"
    };
    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(&app.status, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(format!("{} feeds", app.feeds.len()), Style::default().fg(Color::Green)),
        Span::raw(keys),
    ]));
    frame.render_widget(status, area);
}
