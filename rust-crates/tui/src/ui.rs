use crate::client::{
    AppSnapshot,
    CollectionView,
    PageSnapshot,
    View,
};
use chaos_casino::animation::AnimationFrame;
use chrono::Local;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ethers::types::U256;
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use synchronizer::{
    GameAction,
    GameId,
    Stage,
    games::{
        ANVIL_STRIKE_COST,
        PLINKO_BINS,
        PLINKO_ROWS,
        PRIZES,
        RIFT_CHOICES,
        RISK_LEVELS,
        risk_level,
    },
    notices::NoticeLevel,
    outcome::Rune,
    pending::ItemKind,
};

pub type InputEvents = EventStream;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    NextView,
    PrevView,
    ToggleCollection,
    CycleAccount,
    Refresh,
    Cancel,
    Acknowledge,
    Act(GameAction),
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    view: Option<View>,
    pending_ids: Vec<U256>,
    selected: usize,
    risk: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    AmountModal(AmountState),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AmountPurpose {
    Buy,
    RiftBet { choice: u8 },
    Channel,
    Deposit,
    Withdraw,
    Drop { game: GameId, risk: u8 },
}

impl AmountPurpose {
    fn title(self) -> String {
        match self {
            AmountPurpose::Buy => "Buy coins".to_string(),
            AmountPurpose::RiftBet { choice } => {
                let name = RIFT_CHOICES
                    .get(usize::from(choice))
                    .map_or("?", |choice| choice.name);
                format!("Bet on {name}")
            }
            AmountPurpose::Channel => "Channel coins into the altar".to_string(),
            AmountPurpose::Deposit => "Deposit coins".to_string(),
            AmountPurpose::Withdraw => "Withdraw coins".to_string(),
            AmountPurpose::Drop { risk, .. } => {
                let name = risk_level(risk).map_or("?", |level| level.name);
                format!("Drop a ball ({name} risk)")
            }
        }
    }

    fn action(self, amount: U256) -> GameAction {
        match self {
            AmountPurpose::Buy => GameAction::BuyCoins { amount },
            AmountPurpose::RiftBet { choice } => GameAction::RiftPlaceBet { choice, amount },
            AmountPurpose::Channel => GameAction::AltarChannel { amount },
            AmountPurpose::Deposit => GameAction::PlinkoDeposit { amount },
            AmountPurpose::Withdraw => GameAction::PlinkoWithdraw { amount },
            AmountPurpose::Drop { game, risk } => match game {
                GameId::Pegs => GameAction::PegsDrop { amount, risk },
                GameId::Cascade => GameAction::CascadeDrop { amount, risk },
                _ => GameAction::PlinkoDrop { amount, risk },
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AmountState {
    purpose: AmountPurpose,
    amount: u64,
}

impl AmountState {
    fn new(purpose: AmountPurpose) -> Self {
        Self { purpose, amount: 0 }
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn input_event_stream() -> InputEvents {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEvents) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    // keep what key handling needs between frames
    state.view = Some(snap.view);
    state.pending_ids = snap
        .page
        .as_ref()
        .map(|page| page.pending.iter().map(|item| item.id).collect())
        .unwrap_or_default();
    state.selected = state.selected.min(state.pending_ids.len().saturating_sub(1));
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

/// Maps a terminal event to what the user asked for. Modal keystrokes are
/// consumed here and only surface as `Redraw` or a finished action.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        _ => return None,
    };

    // raw mode delivers ctrl+c as a key press
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
    {
        return None;
    }

    if let Mode::AmountModal(modal) = &mut state.mode {
        return match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let action = modal.purpose.action(U256::from(modal.amount));
                state.mode = Mode::Normal;
                Some(UserEvent::Act(action))
            }
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('+') => {
                modal.amount = modal.amount.saturating_add(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('-') => {
                modal.amount = modal.amount.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                modal.amount /= 10;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                let digit = c.to_digit(10)?;
                modal.amount = modal
                    .amount
                    .saturating_mul(10)
                    .saturating_add(u64::from(digit));
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('q') => return Some(UserEvent::Quit),
        KeyCode::Tab | KeyCode::Right => return Some(UserEvent::NextView),
        KeyCode::BackTab | KeyCode::Left => return Some(UserEvent::PrevView),
        KeyCode::Char('g') => return Some(UserEvent::ToggleCollection),
        KeyCode::Char('a') => return Some(UserEvent::CycleAccount),
        KeyCode::Char('u') => return Some(UserEvent::Refresh),
        KeyCode::Char('x') => return Some(UserEvent::Cancel),
        KeyCode::Enter => return Some(UserEvent::Acknowledge),
        KeyCode::Up | KeyCode::Char('k') => {
            state.selected = state.selected.saturating_sub(1);
            return Some(UserEvent::Redraw);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if state.selected + 1 < state.pending_ids.len() {
                state.selected += 1;
            }
            return Some(UserEvent::Redraw);
        }
        _ => {}
    }

    let game = state.view?.game()?;
    let KeyCode::Char(c) = key.code else {
        return None;
    };
    page_key(state, game, c)
}

fn open_amount(state: &mut UiState, purpose: AmountPurpose) -> Option<UserEvent> {
    state.mode = Mode::AmountModal(AmountState::new(purpose));
    Some(UserEvent::Redraw)
}

fn selected_pending(state: &UiState) -> Option<U256> {
    state.pending_ids.get(state.selected).copied()
}

fn page_key(state: &mut UiState, game: GameId, c: char) -> Option<UserEvent> {
    let act = |action| Some(UserEvent::Act(action));
    match (game, c) {
        (GameId::Buy, 'b') => open_amount(state, AmountPurpose::Buy),
        (GameId::Redeem, '1'..='3') => {
            let prize = PRIZES.get(c.to_digit(10)? as usize - 1)?;
            act(GameAction::RedeemPoints {
                cost: U256::from(prize.cost),
            })
        }
        (GameId::CoinFlip, 'h') => act(GameAction::FlipPlaceBet { heads: true }),
        (GameId::CoinFlip, 't') => act(GameAction::FlipPlaceBet { heads: false }),
        (GameId::CoinFlip, 'f') => act(GameAction::FlipCoin),
        (GameId::CoinFlip, 'c') => act(GameAction::FlipClaim),
        (GameId::Rift, '1'..='4') => {
            let choice = u8::try_from(c.to_digit(10)? - 1).ok()?;
            open_amount(state, AmountPurpose::RiftBet { choice })
        }
        (GameId::Rift, 'r') => act(GameAction::RiftResolve {
            bet_id: selected_pending(state)?,
        }),
        (GameId::Anvil, 's') => act(GameAction::AnvilStrike),
        (GameId::Anvil, 'r') => act(GameAction::AnvilResolve {
            strike_id: selected_pending(state)?,
        }),
        (GameId::Altar, 'b') => open_amount(state, AmountPurpose::Channel),
        (GameId::Plinko, 'd') => open_amount(state, AmountPurpose::Deposit),
        (GameId::Plinko, 'w') => open_amount(state, AmountPurpose::Withdraw),
        (GameId::Plinko | GameId::Pegs | GameId::Cascade, 'b') => {
            let risk = state.risk;
            open_amount(state, AmountPurpose::Drop { game, risk })
        }
        (GameId::Plinko | GameId::Pegs | GameId::Cascade, 'v') => {
            state.risk = (state.risk + 1) % RISK_LEVELS.len() as u8;
            Some(UserEvent::Redraw)
        }
        (GameId::Cascade, 'c') => act(GameAction::CascadeCollect),
        _ => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // network + account
            Constraint::Length(3), // page tabs
            Constraint::Min(12),   // page body
            Constraint::Length(7), // notices
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_tabs(f, chunks[1], snap);
    match (&snap.page, snap.view) {
        (Some(page), View::Game(_)) => draw_page(f, chunks[2], state, snap, page),
        _ => draw_collection(f, chunks[2], &snap.collection),
    }
    draw_notices(f, chunks[3], snap);
    draw_help(f, chunks[4], snap.view);
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let account = match (&snap.account_label, snap.account) {
        (Some(label), Some(account)) => format!("{label} {}", account.short()),
        _ => "not connected".to_string(),
    };
    let mut spans = vec![
        Span::styled("Chaos Casino", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" | {} | {account}", snap.network)),
    ];
    if snap.read_only {
        spans.push(Span::styled(" (read-only)", Style::default().fg(Color::Yellow)));
    }
    if snap.account_count > 1 {
        spans.push(Span::raw(format!(" | {} accounts", snap.account_count)));
    }
    if let Some(status) = &snap.status {
        spans.push(Span::styled(
            format!(" | {status}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    let widget = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_tabs(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let titles: Vec<&str> = View::ORDER.iter().map(|view| view.title()).collect();
    let selected = View::ORDER
        .iter()
        .position(|view| *view == snap.view)
        .unwrap_or_default();
    let tabs = Tabs::new(titles)
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL).title("Pages"));
    f.render_widget(tabs, area);
}

fn draw_page(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot, page: &PageSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(34), Constraint::Min(30)])
        .split(area);

    let mut read_lines: Vec<Line> = page
        .reads
        .iter()
        .map(|read| {
            let mut spans = vec![Span::raw(format!("{}: {}", read.label, read.value))];
            if read.degraded {
                spans.push(Span::styled(" (stale)", Style::default().fg(Color::Red)));
            }
            Line::from(spans)
        })
        .collect();
    if let Some(seconds) = page.altar_seconds_left {
        read_lines.push(Line::from(format!(
            "Next harbinger in {}:{:02}",
            seconds / 60,
            seconds % 60
        )));
    }
    let reads = Paragraph::new(read_lines)
        .block(Block::default().borders(Borders::ALL).title("Balances"));
    f.render_widget(reads, cols[0]);

    let mut lines: Vec<Line> = Vec::new();
    let phase_style = if page.busy {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Green)
    };
    lines.push(Line::styled(page.phase.clone(), phase_style));
    lines.push(Line::from(stage_text(page.game, &page.stage)));
    lines.push(Line::from(""));
    lines.extend(game_lines(state, page));
    if let Some(frame) = snap.animation {
        lines.push(Line::from(""));
        lines.extend(animation_lines(frame));
    }
    if let Stage::ResultAvailable(result) = &page.stage {
        let style = if result.win {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Red)
        };
        lines.push(Line::from(""));
        lines.push(Line::styled(result.headline(), style));
        if let Some(rune) = result.rune() {
            lines.push(Line::from(rune.description()));
        }
        lines.push(Line::from("Enter to dismiss"));
    }
    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(page.game.title()));
    f.render_widget(body, cols[1]);
}

fn stage_text(game: GameId, stage: &Stage) -> &'static str {
    match (game, stage) {
        (GameId::CoinFlip, Stage::Ready) => "Choose heads or tails.",
        (GameId::CoinFlip, Stage::AwaitingResolution) => "Bet placed. Flip the coin!",
        (GameId::CoinFlip, Stage::Claimable) => "You won! Claim your points.",
        (_, Stage::Ready) => "Ready.",
        (_, Stage::AwaitingResolution) => "Waiting to be resolved.",
        (_, Stage::ResultAvailable(_)) => "Result:",
        (_, Stage::Claimable) => "Winnings to claim.",
    }
}

fn game_lines(state: &UiState, page: &PageSnapshot) -> Vec<Line<'static>> {
    match page.game {
        GameId::Redeem => PRIZES
            .iter()
            .enumerate()
            .map(|(i, prize)| {
                Line::from(format!(
                    "{}) {} - {} points. {}",
                    i + 1,
                    prize.name,
                    prize.cost,
                    prize.description
                ))
            })
            .collect(),
        GameId::Rift | GameId::Anvil => {
            let mut lines: Vec<Line> = Vec::new();
            if page.game == GameId::Rift {
                lines.extend(RIFT_CHOICES.iter().map(|choice| {
                    Line::from(format!(
                        "{}) {} {} ({})",
                        choice.id + 1,
                        choice.name,
                        choice.multiplier,
                        choice.tag
                    ))
                }));
            } else {
                lines.push(Line::from(format!("A strike costs {ANVIL_STRIKE_COST} coins.")));
            }
            lines.push(Line::from(""));
            if page.pending.is_empty() {
                lines.push(Line::from("Nothing waiting to be resolved."));
            }
            for (i, item) in page.pending.iter().enumerate() {
                let what = match item.kind {
                    ItemKind::RiftChoice { choice } => RIFT_CHOICES
                        .get(usize::from(choice))
                        .map_or("unknown choice", |choice| choice.name),
                    ItemKind::AnvilStrike => "strike",
                };
                let marker = if i == state.selected { ">" } else { " " };
                lines.push(Line::from(format!(
                    "{marker} #{} {what}, {} coins, {}",
                    item.id,
                    item.amount,
                    item.created_at.with_timezone(&Local).format("%H:%M:%S")
                )));
            }
            lines
        }
        GameId::Plinko | GameId::Pegs | GameId::Cascade => {
            let Some(level) = risk_level(state.risk) else {
                return Vec::new();
            };
            let mut lines = vec![Line::from(format!("Risk: {}", level.name))];
            if page.game != GameId::Cascade {
                let row = level
                    .multipliers
                    .iter()
                    .map(|m| format!("{m}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                lines.push(Line::from(format!("Bins: {row}")));
            }
            lines
        }
        _ => Vec::new(),
    }
}

fn animation_lines(frame: AnimationFrame) -> Vec<Line<'static>> {
    match frame {
        AnimationFrame::Coin { heads, settled } => {
            let face = if heads { "( H )" } else { "( T )" };
            let style = if settled {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Yellow)
            };
            vec![Line::styled(face, style)]
        }
        AnimationFrame::Ball {
            row,
            column,
            settled,
        } => {
            let mut lines = Vec::with_capacity(2);
            let mut track = vec!['.'; PLINKO_BINS];
            if let Some(slot) = track.get_mut(column) {
                *slot = 'o';
            }
            let label = if settled {
                "landed".to_string()
            } else {
                format!("row {row}/{PLINKO_ROWS}")
            };
            lines.push(Line::from(format!(
                "[{}] {label}",
                track.into_iter().collect::<String>()
            )));
            lines
        }
    }
}

fn draw_collection(f: &mut Frame, area: Rect, collection: &CollectionView) {
    let lines: Vec<Line> = match collection {
        CollectionView::NotLoaded => vec![Line::from("Press u to load your runes.")],
        CollectionView::Loading => vec![Line::from("Reading your runes…")],
        CollectionView::Failed(err) => {
            vec![Line::styled(err.clone(), Style::default().fg(Color::Red))]
        }
        CollectionView::Loaded(collection) => {
            let mut lines = vec![Line::from(format!(
                "{} runes owned ({} listed)",
                collection.balance,
                collection.total()
            ))];
            for rune in Rune::ALL {
                let ids = collection
                    .tokens
                    .get(&rune)
                    .map(|ids| {
                        ids.iter()
                            .map(|id| format!("#{id}"))
                            .collect::<Vec<_>>()
                            .join(" ")
                    })
                    .unwrap_or_default();
                let style = if collection.owns(rune) {
                    Style::default().fg(Color::Magenta)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                lines.push(Line::styled(
                    format!("{} x{} {ids}", rune.name(), collection.count(rune)),
                    style,
                ));
            }
            if collection.failed_lookups > 0 {
                lines.push(Line::styled(
                    format!("{} tokens could not be read.", collection.failed_lookups),
                    Style::default().fg(Color::Yellow),
                ));
            }
            lines
        }
    };
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Rune collection"));
    f.render_widget(widget, area);
}

fn draw_notices(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lines: Vec<Line> = snap
        .page
        .as_ref()
        .map(|page| {
            page.notices
                .iter()
                .rev()
                .map(|notice| Line::styled(notice.message.clone(), level_style(notice.level)))
                .collect()
        })
        .unwrap_or_default();
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Notices"));
    f.render_widget(widget, area);
}

fn level_style(level: NoticeLevel) -> Style {
    match level {
        NoticeLevel::Loading => Style::default().fg(Color::Yellow),
        NoticeLevel::Success => Style::default().fg(Color::Green),
        NoticeLevel::Info => Style::default().fg(Color::Cyan),
        NoticeLevel::Error => Style::default().fg(Color::Red),
    }
}

fn draw_help(f: &mut Frame, area: Rect, view: View) {
    let page_keys = match view {
        View::Game(GameId::Buy) => "b buy",
        View::Game(GameId::Redeem) => "1-3 redeem",
        View::Game(GameId::CoinFlip) => "h heads | t tails | f flip | c claim",
        View::Game(GameId::Rift) => "1-4 bet | ↑/↓ select | r resolve",
        View::Game(GameId::Anvil) => "s strike | ↑/↓ select | r resolve",
        View::Game(GameId::Altar) => "b channel",
        View::Game(GameId::Plinko) => "d deposit | w withdraw | b drop | v risk",
        View::Game(GameId::Pegs) => "b drop | v risk",
        View::Game(GameId::Cascade) => "b drop | v risk | c collect",
        View::Collection => "u reload",
    };
    let help = Paragraph::new(format!(
        "{page_keys} | ←/→ page | g runes | a account | u refresh | x stop waiting | q quit"
    ))
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    let Mode::AmountModal(modal) = &state.mode else {
        return;
    };
    let area = centered_rect(40, 20, f.area());
    f.render_widget(Clear, area);
    let text = vec![
        Line::from(format!("Amount: {}", modal.amount)),
        Line::from("digits/↑/↓ to edit, Enter to confirm, Esc to cancel"),
    ];
    let widget = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(modal.purpose.title()),
        );
    f.render_widget(widget, area);
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
