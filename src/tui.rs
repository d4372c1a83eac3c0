use crate::client::SheetClient;
use crate::report::{CategoryReport, Overview};
use crate::sheet::coerce_number;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tui_big_text::{BigText, PixelSize};

fn format_currency(value: f64, currency: &str) -> String {
    let formatted_number = if value.abs() >= 1000.0 {
        format_with_commas(value)
    } else {
        format!("{value:.2}")
    };

    match currency {
        "INR" => format!("₹{formatted_number}"),
        "USD" => format!("${formatted_number}"),
        "EUR" => format!("{formatted_number} €"),
        "GBP" => format!("£{formatted_number}"),
        _ => format!("{formatted_number} {currency}"),
    }
}

fn format_with_commas(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let parts: Vec<&str> = formatted.split('.').collect();
    let integer_part = parts[0];
    let decimal_part = parts.get(1).unwrap_or(&"00");

    let formatted_integer = integer_part
        .chars()
        .rev()
        .collect::<String>()
        .chars()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect::<String>();

    format!("{formatted_integer}.{decimal_part}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
}

/// Refresh results streamed from the background task.
pub type RefreshUpdate = Result<Overview, String>;

pub struct App {
    pub overview: Option<Overview>,
    pub current_tab: usize,
    pub first_row: usize,
    pub should_quit: bool,
    pub error_message: Option<String>,
    pub currency: String,
    pub last_update: Instant,
    pub flash_state: bool,
    pub receiver: Option<mpsc::UnboundedReceiver<RefreshUpdate>>,
    pub network_status: NetworkStatus,
}

impl App {
    pub fn new(currency: String) -> App {
        App {
            overview: None,
            current_tab: 0,
            first_row: 0,
            should_quit: false,
            error_message: None,
            currency,
            last_update: Instant::now(),
            flash_state: false,
            receiver: None,
            network_status: NetworkStatus::Connected,
        }
    }

    pub fn set_receiver(&mut self, receiver: mpsc::UnboundedReceiver<RefreshUpdate>) {
        self.receiver = Some(receiver);
    }

    /// Tab 0 is the overview; category tabs follow, invested group first.
    pub fn tab_titles(&self) -> Vec<String> {
        let mut titles = vec!["Overview".to_string()];
        if let Some(overview) = &self.overview {
            titles.extend(overview.invested.iter().map(|c| c.display_name.clone()));
            titles.extend(overview.sold.iter().map(|c| c.display_name.clone()));
        }
        titles
    }

    pub fn tab_count(&self) -> usize {
        match &self.overview {
            Some(overview) => 1 + overview.invested.len() + overview.sold.len(),
            None => 1,
        }
    }

    pub fn current_category(&self) -> Option<&CategoryReport> {
        let overview = self.overview.as_ref()?;
        let idx = self.current_tab.checked_sub(1)?;
        if idx < overview.invested.len() {
            overview.invested.get(idx)
        } else {
            overview.sold.get(idx - overview.invested.len())
        }
    }

    pub fn next_tab(&mut self) {
        self.current_tab = (self.current_tab + 1) % self.tab_count();
        self.first_row = 0;
    }

    pub fn previous_tab(&mut self) {
        let count = self.tab_count();
        self.current_tab = (self.current_tab + count - 1) % count;
        self.first_row = 0;
    }

    pub fn select_tab(&mut self, tab: usize) {
        if tab < self.tab_count() {
            self.current_tab = tab;
            self.first_row = 0;
        }
    }

    pub fn scroll_down(&mut self) {
        let last = match self.current_category() {
            Some(report) => report.sheet.rows().len().saturating_sub(1),
            None => return,
        };
        if self.first_row < last {
            self.first_row += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.first_row = self.first_row.saturating_sub(1);
    }

    pub fn set_overview(&mut self, overview: Overview) {
        self.overview = Some(overview);
        // A Config change can shrink the tab list between refreshes
        if self.current_tab >= self.tab_count() {
            self.current_tab = 0;
            self.first_row = 0;
        }
    }

    pub fn try_receive_update(&mut self) -> bool {
        if let Some(receiver) = &mut self.receiver {
            if let Ok(update) = receiver.try_recv() {
                match update {
                    Ok(overview) => {
                        self.set_overview(overview);
                        self.network_status = NetworkStatus::Connected;
                        self.error_message = None;
                    }
                    Err(message) => {
                        self.network_status = NetworkStatus::Disconnected;
                        self.error_message = Some(message);
                    }
                }
                self.mark_refreshed();
                return true;
            }
        }
        false
    }

    pub fn mark_refreshed(&mut self) {
        self.last_update = Instant::now();
        self.flash_state = !self.flash_state;
    }
}

pub async fn run_dashboard(
    client: Arc<SheetClient>,
    currency: String,
    refresh_interval: Duration,
) -> eyre::Result<()> {
    // First build happens before taking over the terminal so a dead feed
    // fails loudly instead of leaving an empty dashboard
    let overview = Overview::build(&client).await?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(currency);
    app.set_overview(overview);

    let (update_sender, update_receiver) = mpsc::unbounded_channel();
    app.set_receiver(update_receiver);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            let update = Overview::build(&client).await.map_err(|e| e.to_string());
            if update_sender.send(update).is_err() {
                break;
            }
        }
    });

    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()>
where
    std::io::Error: From<<B as Backend>::Error>,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        app.try_receive_update();

        if crossterm::event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            app.should_quit = true;
                        }
                        KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => {
                            app.previous_tab();
                        }
                        KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => {
                            app.next_tab();
                        }
                        KeyCode::Char('j') | KeyCode::Down => {
                            app.scroll_down();
                        }
                        KeyCode::Char('k') | KeyCode::Up => {
                            app.scroll_up();
                        }
                        KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                            app.select_tab(c as usize - '1' as usize);
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    let tab_titles: Vec<Line> = app
        .tab_titles()
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let style = if i == app.current_tab {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(title.clone(), style))
        })
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title("sheetfolio"))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Yellow))
        .select(app.current_tab);

    f.render_widget(tabs, chunks[0]);

    if app.current_tab == 0 {
        render_overview(f, chunks[1], app);
    } else if app.current_category().is_some() {
        render_category(f, chunks[1], app);
    } else {
        render_loading(f, chunks[1]);
    }

    render_status_bar(f, chunks[2], app);

    if let Some(error) = &app.error_message {
        render_error_popup(f, error);
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let updated = app
        .overview
        .as_ref()
        .map(|o| o.built_at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let since_refresh = app.last_update.elapsed().as_secs();
    let network_indicator = match app.network_status {
        NetworkStatus::Connected => "🟢",
        NetworkStatus::Disconnected => "🔴",
    };

    let status = Paragraph::new(format!(
        "h/l (tabs) | j/k (scroll) | 1-9 (direct) | q (quit)  •  built {updated}, checked {since_refresh}s ago {network_indicator}"
    ))
    .block(Block::default().borders(Borders::ALL).title("Help"))
    .style(Style::default().fg(Color::Gray))
    .alignment(Alignment::Center);

    f.render_widget(status, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let Some(overview) = &app.overview else {
        render_loading(f, area);
        return;
    };

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(5),
            Constraint::Min(0),
        ])
        .split(area);

    let headline = &overview.headline;

    // Current value as the centerpiece
    let big_text_value = format_currency(headline.current, &app.currency);
    let big_text = BigText::builder()
        .pixel_size(PixelSize::Quadrant)
        .style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .lines(vec![big_text_value.clone().into()])
        .build();

    let refresh_indicator = if app.flash_state { "🔄" } else { "📊" };
    let big_text_widget = Block::default()
        .borders(Borders::ALL)
        .title(format!(
            "Current Value ({}) {}",
            app.currency, refresh_indicator
        ))
        .title_alignment(Alignment::Center);

    f.render_widget(big_text_widget, main_chunks[0]);

    let inner = main_chunks[0].inner(ratatui::layout::Margin {
        horizontal: 1,
        vertical: 1,
    });
    let big_text_width = big_text_value.chars().count() as u16 * 4;
    let centered_area = if big_text_width < inner.width {
        let margin = (inner.width - big_text_width) / 2;
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(margin),
                Constraint::Min(0),
                Constraint::Length(margin),
            ])
            .split(inner)[1]
    } else {
        inner
    };
    f.render_widget(big_text, centered_area);

    render_summary_cards(f, main_chunks[1], app);
    render_group_allocation(f, main_chunks[2], overview);
}

fn render_summary_cards(f: &mut Frame, area: Rect, app: &App) {
    let Some(overview) = &app.overview else {
        return;
    };
    let headline = &overview.headline;

    let card_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(area);

    let pnl_color = if headline.pnl >= 0.0 {
        Color::Green
    } else {
        Color::Red
    };
    let pct_color = if headline.return_pct >= 0.0 {
        Color::Green
    } else {
        Color::Red
    };

    let cards = [
        (
            "Total Invested",
            format_currency(headline.invested, &app.currency),
            Color::White,
        ),
        ("P&L", format_currency(headline.pnl, &app.currency), pnl_color),
        (
            "Return",
            format!("{:.2}%", headline.return_pct),
            pct_color,
        ),
        (
            "As of",
            headline.as_of.clone().unwrap_or_else(|| "-".to_string()),
            Color::Cyan,
        ),
    ];

    for (chunk, (title, value, color)) in card_chunks.iter().zip(cards) {
        let card = Paragraph::new(value)
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(card, *chunk);
    }
}

fn render_group_allocation(f: &mut Frame, area: Rect, overview: &Overview) {
    let allocation = overview.allocation();
    let data: Vec<(&str, u64)> = allocation
        .iter()
        .map(|(name, share)| (name.as_str(), *share as u64))
        .collect();

    let barchart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Invested Allocation (%)"),
        )
        .data(&data)
        .bar_width(9)
        .bar_style(Style::default().fg(Color::Yellow))
        .value_style(Style::default().fg(Color::Black).bg(Color::Yellow));

    f.render_widget(barchart, area);
}

fn render_category(f: &mut Frame, area: Rect, app: &App) {
    let Some(report) = app.current_category() else {
        render_loading(f, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let sheet = &report.sheet;
    let signed_columns = ["P&L", "Percentage"];

    let header_cells = sheet.columns().iter().map(|h| {
        Cell::from(h.as_str()).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows = sheet.rows().iter().skip(app.first_row).map(|row| {
        let cells = sheet.columns().iter().zip(row).map(|(column, value)| {
            let style = if signed_columns.contains(&column.as_str()) {
                if coerce_number(value) >= 0.0 {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }
            } else {
                Style::default().fg(Color::White)
            };
            Cell::from(value.as_str()).style(style)
        });
        Row::new(cells.collect::<Vec<_>>()).height(1)
    });

    let column_count = sheet.columns().len().max(1) as u32;
    let constraints = vec![Constraint::Ratio(1, column_count); column_count as usize];

    let title = format!(
        "{} ({} rows)",
        report.display_name,
        sheet.rows().len()
    );
    let table = Table::new(rows, constraints)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(Color::White));

    f.render_widget(table, chunks[0]);

    let s = report.summary;
    let pnl_style = if s.pnl >= 0.0 {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };
    let pct_style = if s.return_pct >= 0.0 {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };

    let totals = Line::from(vec![
        Span::raw(format!(
            "Invested {}   ",
            format_currency(s.invested, &app.currency)
        )),
        Span::raw(format!(
            "Current {}   ",
            format_currency(s.current, &app.currency)
        )),
        Span::styled(
            format!("P&L {}   ", format_currency(s.pnl, &app.currency)),
            pnl_style,
        ),
        Span::styled(format!("Return {:.2}%", s.return_pct), pct_style),
    ]);

    let summary = Paragraph::new(totals)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Section Totals"));

    f.render_widget(summary, chunks[1]);
}

fn render_loading(f: &mut Frame, area: Rect) {
    let loading_text = Paragraph::new("Loading sheets...")
        .block(Block::default().borders(Borders::ALL).title("Loading"))
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center);

    f.render_widget(loading_text, area);
}

fn render_error_popup(f: &mut Frame, error: &str) {
    let popup_area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, popup_area);

    let error_paragraph = Paragraph::new(error)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Refresh failed")
                .style(Style::default().fg(Color::Red)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(error_paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Headline, SectionSummary};
    use crate::sheet::Sheet;
    use chrono::Local;

    fn sample_overview() -> Overview {
        let sheet = Sheet::from_csv("Stocks Invested", "Name,P&L\nINFY,₹10\nTCS,-₹4\n").unwrap();
        let report = CategoryReport {
            display_name: "Stocks".to_string(),
            summary: SectionSummary::from_sheet(&sheet),
            sheet,
        };
        Overview {
            headline: Headline::default(),
            invested: vec![report],
            sold: Vec::new(),
            built_at: Local::now(),
        }
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1234.5, "INR"), "₹1,234.50");
        assert_eq!(format_currency(999.9, "INR"), "₹999.90");
        assert_eq!(format_currency(-1500.0, "USD"), "$-1,500.00");
        assert_eq!(format_currency(12.0, "CHF"), "12.00 CHF");
    }

    #[test]
    fn test_tab_cycling_wraps() {
        let mut app = App::new("INR".to_string());
        app.set_overview(sample_overview());
        assert_eq!(app.tab_count(), 2);

        app.next_tab();
        assert_eq!(app.current_tab, 1);
        app.next_tab();
        assert_eq!(app.current_tab, 0);
        app.previous_tab();
        assert_eq!(app.current_tab, 1);
    }

    #[test]
    fn test_shrinking_overview_resets_tab() {
        let mut app = App::new("INR".to_string());
        app.set_overview(sample_overview());
        app.select_tab(1);

        let mut smaller = sample_overview();
        smaller.invested.clear();
        app.set_overview(smaller);
        assert_eq!(app.current_tab, 0);
    }

    #[test]
    fn test_try_receive_update() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut app = App::new("INR".to_string());
        app.set_receiver(receiver);

        sender.send(Ok(sample_overview())).unwrap();
        assert!(app.try_receive_update());
        assert!(app.overview.is_some());
        assert_eq!(app.network_status, NetworkStatus::Connected);

        sender.send(Err("request for sheet 'Config' failed".to_string())).unwrap();
        assert!(app.try_receive_update());
        assert_eq!(app.network_status, NetworkStatus::Disconnected);
        assert!(app.error_message.is_some());
    }

    #[test]
    fn test_scroll_is_bounded() {
        let mut app = App::new("INR".to_string());
        app.set_overview(sample_overview());
        app.select_tab(1);

        app.scroll_up();
        assert_eq!(app.first_row, 0);
        app.scroll_down();
        assert_eq!(app.first_row, 1);
        app.scroll_down();
        assert_eq!(app.first_row, 1);
    }
}
