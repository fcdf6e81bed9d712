use crate::app::{ActiveInput, App, InputMode, LoginField, Screen, SignupField};
use crate::models::{Priority, Task};
use crate::query::{is_overdue, SortDirection};
use chrono::{DateTime, Utc};
use crossterm::event::{self, Event as CEvent};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn priority_style(priority: Priority) -> Style {
    let color = match priority {
        Priority::Low => Color::Green,
        Priority::Medium => Color::Blue,
        Priority::High => Color::Yellow,
        Priority::Urgent => Color::Red,
    };
    Style::default().fg(color)
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(format!(" {} ", key), Style::default().fg(Color::Red)),
        Span::raw(format!(": {} ", action)),
    ]
}

fn legend_line(hints: &[(&'static str, &'static str)]) -> Text<'static> {
    let mut spans = Vec::new();
    for (key, action) in hints {
        spans.extend(key_hint(key, action));
    }
    Text::from(Line::from(spans))
}

fn get_legend(app: &App) -> Text<'static> {
    match app.screen {
        Screen::Login => legend_line(&[
            ("Enter", "Log In"),
            ("Tab", "Switch Field"),
            ("F2", "Sign Up"),
            ("Esc", "Quit"),
        ]),
        Screen::Signup => legend_line(&[
            ("Enter", "Create Account"),
            ("Tab", "Next Field"),
            ("Esc", "Back to Login"),
        ]),
        Screen::Lists => match app.input_mode {
            InputMode::Editing => legend_line(&[
                ("Enter", "Create"),
                ("Tab", "Switch Field"),
                ("Esc", "Cancel"),
            ]),
            _ => legend_line(&[
                ("q", "Quit"),
                ("j/k", "Move"),
                ("Enter", "Open"),
                ("a", "New List"),
                ("e", "Edit"),
                ("d", "Delete"),
                ("r", "Refresh"),
                ("o", "Log Out"),
            ]),
        },
        Screen::Tasks => match app.input_mode {
            InputMode::Editing => legend_line(&[("Enter", "Add"), ("Esc", "Cancel")]),
            InputMode::Search => legend_line(&[("Enter", "Keep"), ("Esc", "Clear")]),
            InputMode::Normal => legend_line(&[
                ("Esc", "Back"),
                ("j/k", "Move"),
                ("Space", "Toggle Done"),
                ("a", "Add"),
                ("d", "Delete"),
                ("/", "Search"),
                ("f", "Status"),
                ("p", "Priority"),
                ("1/2/3", "Sort"),
                ("c", "Clear Filters"),
                ("q", "Quit"),
            ]),
        },
    }
}

fn input_field(label: &str, value: &str, focused: bool, masked: bool) -> Line<'static> {
    let shown = if masked {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let label_style = if focused {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let cursor = if focused { "_" } else { "" };
    Line::from(vec![
        Span::styled(format!("{:>18}: ", label), label_style),
        Span::raw(shown),
        Span::styled(cursor.to_string(), Style::default().fg(Color::Green)),
    ])
}

fn draw_login(f: &mut Frame<'_>, app: &App, area: Rect) {
    let popup = centered_rect_absolute(56, 8, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("taskdeck - Log In");

    let lines = vec![
        Line::from(""),
        input_field(
            "Username",
            &app.login_username,
            app.login_focus == LoginField::Username,
            false,
        ),
        input_field(
            "Password",
            &app.login_password,
            app.login_focus == LoginField::Password,
            true,
        ),
        Line::from(""),
        Line::from(Span::styled(
            "  No account yet? Press F2 to sign up.",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let form = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(Clear, popup);
    f.render_widget(form, popup);
}

fn draw_signup(f: &mut Frame<'_>, app: &App, area: Rect) {
    let popup = centered_rect_absolute(56, 10, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("taskdeck - Sign Up");

    let lines = vec![
        Line::from(""),
        input_field(
            "Username",
            &app.signup_form.username,
            app.signup_focus == SignupField::Username,
            false,
        ),
        input_field(
            "Email",
            &app.signup_form.email,
            app.signup_focus == SignupField::Email,
            false,
        ),
        input_field(
            "Password",
            &app.signup_form.password,
            app.signup_focus == SignupField::Password,
            true,
        ),
        input_field(
            "Confirm password",
            &app.signup_form.confirm_password,
            app.signup_focus == SignupField::Confirm,
            true,
        ),
    ];

    let form = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(Clear, popup);
    f.render_widget(form, popup);
}

fn draw_lists(f: &mut Frame<'_>, app: &mut App, area: Rect) {
    let rows: Vec<ListItem> = if app.lists.is_empty() {
        vec![ListItem::new(
            "No todo lists yet. Press 'a' to create your first one.",
        )]
    } else {
        app.lists
            .iter()
            .map(|list| {
                let mut spans = vec![Span::raw(list.name.clone())];
                spans.push(Span::styled(
                    format!("  ({} items)", list.item_count),
                    Style::default().fg(Color::DarkGray),
                ));
                if let Some(desc) = list.description.as_deref().filter(|d| !d.is_empty()) {
                    spans.push(Span::styled(
                        format!("  - {}", desc),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let widget = List::new(rows)
        .block(Block::default().borders(Borders::ALL).title("My Todo Lists"))
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(widget, area, &mut app.list_state);

    if let InputMode::Editing = app.input_mode {
        let popup = centered_rect_absolute(60, 6, area);
        let title_style = |focused: bool| {
            if focused {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            }
        };
        let lines = vec![
            Line::from(vec![
                Span::styled("Name: ", title_style(app.active_list_input == ActiveInput::Name)),
                Span::raw(app.new_list_name.clone()),
            ]),
            Line::from(vec![
                Span::styled(
                    "Description: ",
                    title_style(app.active_list_input == ActiveInput::Description),
                ),
                Span::raw(app.new_list_description.clone()),
            ]),
        ];
        let title = if app.editing_list.is_some() {
            "Edit List (Enter to Save)"
        } else {
            "New List (Enter to Create)"
        };
        let form = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .style(Style::default().fg(Color::Green)),
            )
            .style(Style::default().fg(Color::White))
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, popup);
        f.render_widget(form, popup);
    }
}

fn task_row(task: &Task, now: DateTime<Utc>) -> ListItem<'static> {
    let checkbox = if task.completed { "[x] " } else { "[ ] " };
    let title_style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default()
    };

    let mut spans = vec![
        Span::raw(checkbox.to_string()),
        Span::styled(format!("{:<7}", task.priority.as_str()), priority_style(task.priority)),
        Span::raw(" "),
        Span::styled(task.title.clone(), title_style),
    ];
    if let Some(due) = task.due_date {
        let overdue = is_overdue(task, now);
        let (label, style) = if overdue {
            ("overdue", Style::default().fg(Color::Red))
        } else {
            ("due", Style::default().fg(Color::DarkGray))
        };
        spans.push(Span::styled(
            format!("  {} {}", label, due.format("%Y-%m-%d")),
            style,
        ));
    }
    ListItem::new(Line::from(spans))
}

fn draw_tasks(f: &mut Frame<'_>, app: &mut App, area: Rect, now: DateTime<Utc>) {
    let visible = app.visible_tasks();
    let counts = app.progress();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    // Progress header over the full collection; filters never move it.
    let list_name = app
        .current_list
        .as_ref()
        .map(|l| l.name.clone())
        .unwrap_or_default();
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(list_name))
        .gauge_style(Style::default().fg(Color::Blue))
        .percent(counts.percent())
        .label(format!("{} of {} completed", counts.completed, counts.total));
    f.render_widget(gauge, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
        .split(chunks[1]);

    // Left panel: the visible subset
    let title = format!("Tasks ({})", visible.len());
    let tasks_widget = if !visible.is_empty() {
        let rows: Vec<ListItem> = visible.iter().map(|task| task_row(task, now)).collect();
        List::new(rows)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    } else if counts.total == 0 {
        List::new(vec![ListItem::new("No tasks yet. Press 'a' to add one.")])
            .block(Block::default().borders(Borders::ALL).title(title))
    } else {
        List::new(vec![ListItem::new(
            "No matching tasks. Press 'c' to clear filters.",
        )])
        .block(Block::default().borders(Borders::ALL).title(title))
    };
    f.render_stateful_widget(tasks_widget, body[0], &mut app.task_state);

    // Right panel: view settings and selected-task details
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)].as_ref())
        .split(body[1]);

    let direction = match app.query.direction {
        SortDirection::Asc => "ascending",
        SortDirection::Desc => "descending",
    };
    let priority_label = app
        .query
        .priority
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "Any".to_string());
    let search_shown = if app.search_input.is_empty() {
        "-".to_string()
    } else {
        app.search_input.clone()
    };
    let view_lines = vec![
        Line::from(vec![
            Span::styled("Status:   ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(app.query.status.label()),
        ]),
        Line::from(vec![
            Span::styled("Priority: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(priority_label),
        ]),
        Line::from(vec![
            Span::styled("Sort:     ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{} ({})", app.query.sort_key.label(), direction)),
        ]),
        Line::from(vec![
            Span::styled("Search:   ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(search_shown),
        ]),
    ];
    let view_widget = Paragraph::new(view_lines)
        .block(Block::default().borders(Borders::ALL).title("View"))
        .wrap(Wrap { trim: true });
    f.render_widget(view_widget, side[0]);

    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");
    if let Some(task) = app.task_state.selected().and_then(|i| visible.get(i)) {
        let due = match task.due_date {
            Some(date) => date.format("%Y-%m-%d %H:%M").to_string(),
            None => "No due date".to_string(),
        };
        let mut lines = vec![
            Line::from(vec![
                Span::styled("Due Date: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(due),
            ]),
            Line::from(vec![
                Span::styled("Priority: ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(task.priority.as_str(), priority_style(task.priority)),
            ]),
            Line::from(vec![
                Span::styled("Created:  ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(task.created_at.format("%Y-%m-%d").to_string()),
            ]),
            Line::from(vec![Span::styled(
                "Description: ",
                Style::default().add_modifier(Modifier::BOLD),
            )]),
        ];
        if task.description.is_empty() {
            lines.push(Line::from(Span::raw("No description".to_string())));
        } else {
            for text_line in task.description.lines() {
                lines.push(Line::from(Span::raw(text_line.to_string())));
            }
        }
        let paragraph = Paragraph::new(lines)
            .block(detail_block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, side[1]);
    } else {
        let paragraph = Paragraph::new("Select a task to view details")
            .block(detail_block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, side[1]);
    }

    match app.input_mode {
        InputMode::Editing => {
            // widths can exceed u16 range mid-multiply on very wide terminals
            let popup_width = ((area.width as u32 * 60 / 100) as u16).saturating_sub(2);
            let lines_required = calculate_wrapped_lines(&app.new_task_input, popup_width.max(1));
            let required_height = std::cmp::max(lines_required as u16, 1);
            let popup_height = std::cmp::min(required_height + 2, area.height.saturating_sub(2));
            let popup_area = centered_rect_absolute(popup_width + 2, popup_height, area);

            let popup_block = Block::default()
                .title("New Task (!priority and due:YYYY-MM-DD understood)")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Green));

            let input = Paragraph::new(app.new_task_input.as_str())
                .style(Style::default().fg(Color::White))
                .block(popup_block)
                .wrap(Wrap { trim: false });

            f.render_widget(Clear, popup_area);
            f.render_widget(input, popup_area);
        }
        InputMode::Search => {
            let popup_area = centered_rect_absolute(area.width.saturating_sub(8).min(50), 3, area);
            let popup_block = Block::default()
                .title("Search tasks")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Green));
            let input = Paragraph::new(app.search_input.as_str())
                .style(Style::default().fg(Color::White))
                .block(popup_block);
            f.render_widget(Clear, popup_area);
            f.render_widget(input, popup_area);
        }
        InputMode::Normal => {}
    }
}

fn draw(f: &mut Frame<'_>, app: &mut App, now: DateTime<Utc>) {
    let size = f.area();

    // Split the main layout into body and footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([Constraint::Min(0), Constraint::Length(2)].as_ref())
        .split(size);

    let body_chunk = chunks[0];
    let footer_chunk = chunks[1];

    match app.screen {
        Screen::Login => draw_login(f, app, body_chunk),
        Screen::Signup => draw_signup(f, app, body_chunk),
        Screen::Lists => draw_lists(f, app, body_chunk),
        Screen::Tasks => draw_tasks(f, app, body_chunk, now),
    }

    // Footer: server/status message on top of the keybinding legend
    let footer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)].as_ref())
        .split(footer_chunk);

    if let Some(message) = &app.status_line {
        let status = Paragraph::new(message.as_str())
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Left);
        f.render_widget(status, footer[0]);
    }

    let legend = Paragraph::new(get_legend(app))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(legend, footer[1]);
}

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        let now = Utc::now();
        terminal.draw(|f| draw(f, &mut app, now))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                let should_quit = app.handle_input(key).await?;
                if should_quit {
                    return Ok(());
                }
            }
        }
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count() as u16;
        line_count += ((line_width + max_width - 1) / max_width) as usize;
    }
    line_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use ratatui::backend::TestBackend;

    fn test_app(screen: Screen, input_mode: InputMode) -> App {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:1"));
        app.screen = screen;
        app.input_mode = input_mode;
        app
    }

    #[test]
    fn add_task_popup_renders_on_very_wide_terminals() {
        let backend = TestBackend::new(1600, 48);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut app = test_app(Screen::Tasks, InputMode::Editing);
        app.new_task_input = "Water the plants !high due:2024-07-01".to_string();
        let now = Utc::now();
        terminal.draw(|f| draw(f, &mut app, now)).unwrap();
    }

    #[test]
    fn every_screen_renders_on_a_small_terminal() {
        let backend = TestBackend::new(40, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        let now = Utc::now();
        for screen in [Screen::Login, Screen::Signup, Screen::Lists, Screen::Tasks] {
            let mut app = test_app(screen, InputMode::Normal);
            terminal.draw(|f| draw(f, &mut app, now)).unwrap();
        }
    }
}
