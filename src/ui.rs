use crate::app::{App, InputMode, LibraryRow, Section};
use crate::lyrics::active_line;
use crate::model::Track;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use std::time::Duration;

const APP_TITLE_WITH_VERSION: &str = "Airtune v0.1.0  ";

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    panel_alt_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    playlist: Color,
    selected_bg: Color,
}

fn palette() -> Palette {
    Palette {
        bg: Color::Rgb(10, 15, 24),
        panel_bg: Color::Rgb(19, 29, 43),
        panel_alt_bg: Color::Rgb(24, 38, 58),
        border: Color::Rgb(69, 121, 176),
        text: Color::Rgb(214, 228, 248),
        muted: Color::Rgb(149, 173, 204),
        accent: Color::Rgb(100, 203, 184),
        alert: Color::Rgb(249, 174, 88),
        playlist: Color::Rgb(156, 186, 255),
        selected_bg: Color::Rgb(34, 55, 82),
    }
}

pub fn draw(frame: &mut Frame, app: &App, input: Option<(InputMode, &str)>) {
    let colors = palette();
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    draw_header(frame, app, &colors, vertical[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(vertical[1]);

    draw_section(frame, app, &colors, body[0]);
    draw_now_playing(frame, app, &colors, body[1]);
    draw_timeline(frame, app, &colors, vertical[2]);
    draw_footer(frame, app, &colors, input, vertical[3]);
}

fn draw_header(frame: &mut Frame, app: &App, colors: &Palette, area: Rect) {
    frame.render_widget(
        panel_block("Status", colors.panel_bg, colors.text, colors.border),
        area,
    );

    let inner = area.inner(Margin {
        vertical: 0,
        horizontal: 1,
    });
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(48), Constraint::Percentage(52)])
        .split(inner);

    let left = Paragraph::new(Line::from(vec![
        Span::styled(
            APP_TITLE_WITH_VERSION,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("Mode {}", app.player.play_mode().label()),
            Style::default().fg(colors.alert),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("Quality {}", app.player.quality().label()),
            Style::default().fg(colors.text),
        ),
    ]));
    frame.render_widget(left, chunks[0]);

    let right = Paragraph::new(section_tabs(app.section, colors)).alignment(Alignment::Right);
    frame.render_widget(right, chunks[1]);
}

fn section_tabs(selected: Section, colors: &Palette) -> Line<'static> {
    let mut spans = vec![Span::styled(
        "Tab to switch",
        Style::default().fg(colors.muted),
    )];
    spans.push(Span::styled(" - ", Style::default().fg(colors.muted)));

    for (idx, section) in [
        Section::Search,
        Section::Queue,
        Section::Library,
        Section::Lyrics,
    ]
    .into_iter()
    .enumerate()
    {
        if idx > 0 {
            spans.push(Span::styled(" -- ", Style::default().fg(colors.muted)));
        }
        let mut style = Style::default().fg(colors.accent);
        if section == selected {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        spans.push(Span::styled(section.label(), style));
    }

    Line::from(spans)
}

fn draw_section(frame: &mut Frame, app: &App, colors: &Palette, area: Rect) {
    match app.section {
        Section::Search if app.browsing_top => {
            let items: Vec<ListItem> = app
                .top_lists
                .iter()
                .map(|list| {
                    ListItem::new(Line::from(vec![
                        Span::styled(
                            format!("    {}", list.name),
                            Style::default().fg(colors.playlist),
                        ),
                        Span::styled(
                            format!("  {}", list.update_frequency),
                            Style::default().fg(colors.muted),
                        ),
                    ]))
                })
                .collect();
            let len = app.top_lists.len();
            draw_list(frame, app, colors, area, "Charts  (Enter to open)", items, len);
        }
        Section::Search => {
            let title = if app.search_in_flight {
                String::from("Search (working...)")
            } else {
                String::from("Search  (/ to type, t charts, Enter to play, a to queue)")
            };
            let items = track_items(&app.search_results, app.player.current(), colors);
            draw_list(frame, app, colors, area, &title, items, app.search_results.len());
        }
        Section::Queue => {
            let title = format!("Queue  ({} songs)", app.player.queue().len());
            let items = track_items(app.player.queue(), app.player.current(), colors);
            draw_list(frame, app, colors, area, &title, items, app.player.queue().len());
        }
        Section::Library => {
            let rows = app.library_rows();
            let items: Vec<ListItem> = rows
                .iter()
                .map(|row| match row {
                    LibraryRow::Back => ListItem::new(Span::styled(
                        "    ..",
                        Style::default().fg(colors.alert),
                    )),
                    LibraryRow::Favorites(count) => ListItem::new(Span::styled(
                        format!("    Favorites ({count})"),
                        Style::default().fg(colors.accent),
                    )),
                    LibraryRow::Playlist { name, count, .. } => ListItem::new(Span::styled(
                        format!("    {name} ({count})"),
                        Style::default().fg(colors.playlist),
                    )),
                    LibraryRow::Song(track) => track_item(track, app.player.current(), colors),
                })
                .collect();
            let len = rows.len();
            draw_list(frame, app, colors, area, "Library", items, len);
        }
        Section::Lyrics => draw_lyrics(frame, app, colors, area),
    }
}

fn track_items<'a>(
    tracks: &'a [Track],
    current: Option<&Track>,
    colors: &Palette,
) -> Vec<ListItem<'a>> {
    tracks
        .iter()
        .map(|track| track_item(track, current, colors))
        .collect()
}

fn track_item<'a>(track: &'a Track, current: Option<&Track>, colors: &Palette) -> ListItem<'a> {
    let marker = if current.is_some_and(|now| now.same_song(track)) {
        "  > "
    } else {
        "    "
    };
    ListItem::new(Line::from(vec![
        Span::styled(marker, Style::default().fg(colors.muted)),
        Span::styled(track.name.as_str(), Style::default().fg(colors.text)),
        Span::styled(
            format!("  {}", track.artist),
            Style::default().fg(colors.muted),
        ),
    ]))
}

fn draw_list(
    frame: &mut Frame,
    app: &App,
    colors: &Palette,
    area: Rect,
    title: &str,
    items: Vec<ListItem>,
    len: usize,
) {
    let mut state = ListState::default();
    state.select((len > 0).then_some(app.selected().min(len.saturating_sub(1))));

    let list = List::new(items)
        .block(panel_block(title, colors.panel_bg, colors.text, colors.border))
        .highlight_style(
            Style::default()
                .bg(colors.selected_bg)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("-> ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_lyrics(frame: &mut Frame, app: &App, colors: &Palette, area: Rect) {
    let position_ms = app.player.position().as_millis().min(u128::from(u32::MAX)) as u32;
    let active = active_line(&app.lyric_lines, position_ms);

    let text: Vec<Line> = if app.lyric_lines.is_empty() {
        vec![Line::from(Span::styled(
            "No lyrics",
            Style::default().fg(colors.muted),
        ))]
    } else {
        app.lyric_lines
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let style = if Some(idx) == active {
                    Style::default()
                        .fg(colors.accent)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(colors.muted)
                };
                Line::from(Span::styled(line.text.as_str(), style))
            })
            .collect()
    };

    // Keep the active line in view by dropping everything far above it.
    let visible_height = area.height.saturating_sub(2) as usize;
    let skip = active
        .unwrap_or(0)
        .saturating_sub(visible_height.saturating_sub(1) / 2);
    let window: Vec<Line> = text.into_iter().skip(skip).collect();

    let paragraph = Paragraph::new(window)
        .block(panel_block(
            "Lyrics",
            colors.panel_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_now_playing(frame: &mut Frame, app: &App, colors: &Palette, area: Rect) {
    let current = app.player.current();
    let title = current.map(|track| track.name.as_str()).unwrap_or("-");
    let artist = current.map(|track| track.artist.as_str()).unwrap_or("-");
    let album = current.map(|track| track.album.as_str()).unwrap_or("-");
    let source = current.map(|track| track.source.as_str()).unwrap_or("-");

    let state = if app.player.is_loading() {
        "loading"
    } else if app.player.is_playing() {
        "playing"
    } else if current.is_some() {
        "paused"
    } else {
        "idle"
    };

    let queue_position = current
        .and_then(|now| {
            app.player
                .queue()
                .iter()
                .position(|entry| entry.same_song(now))
        })
        .map(|idx| format!("{}/{}", idx + 1, app.player.queue().len()))
        .unwrap_or_else(|| format!("-/{}", app.player.queue().len()));

    let favorite = current
        .map(|track| app.library.is_favorite(&track.key()))
        .unwrap_or(false);

    let info_text = vec![
        Line::from(vec![
            Span::styled(
                "Now",
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {title}"), Style::default().fg(colors.text)),
            Span::styled(
                if favorite { "  *" } else { "" },
                Style::default().fg(colors.alert),
            ),
        ]),
        Line::from(Span::styled(
            format!("Artist  {artist}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Album   {album}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("Source  {source}"),
            Style::default().fg(colors.muted),
        )),
        Line::from(Span::styled(
            format!("State   {state}"),
            Style::default().fg(colors.alert),
        )),
        Line::from(Span::styled(
            format!("Queue   {queue_position}"),
            Style::default().fg(colors.alert),
        )),
    ];
    let info_block = Paragraph::new(info_text)
        .block(panel_block(
            "Song Info",
            colors.panel_alt_bg,
            colors.text,
            colors.border,
        ))
        .wrap(Wrap { trim: true });
    frame.render_widget(info_block, area);
}

fn draw_timeline(frame: &mut Frame, app: &App, colors: &Palette, area: Rect) {
    let timeline_block = Paragraph::new(Span::styled(
        timeline_line(app, 26, 14),
        Style::default().fg(colors.text),
    ))
    .block(panel_block(
        "Timeline",
        colors.panel_bg,
        colors.text,
        colors.border,
    ))
    .wrap(Wrap { trim: true });
    frame.render_widget(timeline_block, area);
}

fn draw_footer(
    frame: &mut Frame,
    app: &App,
    colors: &Palette,
    input: Option<(InputMode, &str)>,
    area: Rect,
) {
    let line = match input {
        Some((mode, buffer)) => Line::from(vec![
            Span::styled(
                format!("{}: ", mode.prompt()),
                Style::default()
                    .fg(colors.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(buffer.to_string(), Style::default().fg(colors.text)),
            Span::styled("_", Style::default().fg(colors.accent)),
        ]),
        None => Line::from(vec![
            Span::styled(
                "Keys: Enter play, Space pause, n/b skip, m mode, q quality, f favorite, p play all, Ctrl+C quit",
                Style::default().fg(colors.muted),
            ),
            Span::styled("  |  ", Style::default().fg(colors.muted)),
            Span::styled(app.status.as_str(), Style::default().fg(colors.text)),
        ]),
    };

    let footer = Paragraph::new(line).block(panel_block(
        "Message",
        colors.panel_bg,
        colors.text,
        colors.border,
    ));
    frame.render_widget(footer, area);
}

fn panel_block(title: &str, bg: Color, text: Color, border: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(text).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(bg))
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

fn progress_bar(ratio: Option<f64>, width: usize) -> String {
    let clamped = ratio.unwrap_or(0.0).clamp(0.0, 1.0);
    let filled = (clamped * width as f64).round() as usize;
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width.saturating_sub(filled)));
    bar.push(']');
    bar
}

fn timeline_line(app: &App, timeline_bar_width: usize, volume_bar_width: usize) -> String {
    let elapsed = app.player.position();
    let total = app.player.duration();
    let ratio = total.and_then(|duration| {
        let total_secs = duration.as_secs_f64();
        (total_secs > 0.0).then_some((elapsed.as_secs_f64() / total_secs).clamp(0.0, 1.0))
    });

    let volume_percent = (app.player.volume() * 100.0).round() as u16;
    let volume_ratio = f64::from(app.player.volume().clamp(0.0, 1.0));

    format!(
        "{} / {} {}  |  Vol {} {:>3}%  +/- adjust  Left/Right seek",
        format_duration(elapsed),
        total
            .map(format_duration)
            .unwrap_or_else(|| String::from("--:--")),
        progress_bar(ratio, timeline_bar_width),
        progress_bar(Some(volume_ratio), volume_bar_width),
        volume_percent
    )
}
