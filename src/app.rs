use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use std::io;

use crate::api::{ApiClient, ApiError};
use crate::models::{ListPayload, NewTask, Priority, Task, TaskPatch, TodoList};
use crate::parser::parse_task_input;
use crate::query::{progress, Progress, Query, SortKey};
use crate::validation::{validate_login, validate_signup, SignupForm};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Login,
    Signup,
    Lists,
    Tasks,
}

pub enum InputMode {
    Normal,
    Editing,
    Search,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SignupField {
    Username,
    Email,
    Password,
    Confirm,
}

impl SignupField {
    fn next(self) -> Self {
        match self {
            SignupField::Username => SignupField::Email,
            SignupField::Email => SignupField::Password,
            SignupField::Password => SignupField::Confirm,
            SignupField::Confirm => SignupField::Username,
        }
    }
}

#[derive(PartialEq)]
pub enum ActiveInput {
    Name,
    Description,
}

pub struct App {
    pub client: ApiClient,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub status_line: Option<String>,

    // login / signup forms
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginField,
    pub signup_form: SignupForm,
    pub signup_focus: SignupField,

    // lists screen
    pub lists: Vec<TodoList>,
    pub list_state: ListState,
    pub new_list_name: String,
    pub new_list_description: String,
    pub active_list_input: ActiveInput,
    // Some(id) while the form popup edits an existing list
    pub editing_list: Option<u64>,

    // list detail: the full task collection plus the view query
    pub current_list: Option<TodoList>,
    pub tasks: Vec<Task>,
    pub query: Query,
    pub task_state: ListState,
    pub new_task_input: String,
    pub search_input: String,
}

impl App {
    pub fn new(client: ApiClient) -> App {
        App {
            client,
            screen: Screen::Login,
            input_mode: InputMode::Normal,
            status_line: None,
            login_username: String::new(),
            login_password: String::new(),
            login_focus: LoginField::Username,
            signup_form: SignupForm::default(),
            signup_focus: SignupField::Username,
            lists: Vec::new(),
            list_state: ListState::default(),
            new_list_name: String::new(),
            new_list_description: String::new(),
            active_list_input: ActiveInput::Name,
            editing_list: None,
            current_list: None,
            tasks: Vec::new(),
            query: Query::default(),
            task_state: ListState::default(),
            new_task_input: String::new(),
            search_input: String::new(),
        }
    }

    // --- query engine plumbing ---

    pub fn visible_tasks(&self) -> Vec<Task> {
        self.query.visible(&self.tasks)
    }

    pub fn progress(&self) -> Progress {
        progress(&self.tasks)
    }

    // --- mutation-driven recomputation ---

    pub fn apply_created_task(&mut self, task: Task) {
        self.tasks.push(task);
        if let Some(list) = self.current_list.as_mut() {
            list.item_count += 1;
        }
        self.clamp_task_selection();
    }

    pub fn apply_updated_task(&mut self, task: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task;
        }
    }

    pub fn apply_deleted_task(&mut self, task_id: u64) {
        self.tasks.retain(|t| t.id != task_id);
        if let Some(list) = self.current_list.as_mut() {
            list.item_count -= 1;
        }
        self.clamp_task_selection();
    }

    fn clamp_task_selection(&mut self) {
        let len = self.visible_tasks().len();
        clamp_selection(&mut self.task_state, len);
    }

    fn clamp_list_selection(&mut self) {
        let len = self.lists.len();
        clamp_selection(&mut self.list_state, len);
    }

    // --- error reporting ---

    fn report(&mut self, err: ApiError) {
        let auth_failure = matches!(err, ApiError::Auth(_) | ApiError::NotAuthenticated);
        self.status_line = Some(err.to_string());
        if auth_failure {
            // The wrapper already cleared the token; force a fresh login.
            self.screen = Screen::Login;
            self.input_mode = InputMode::Normal;
        }
    }

    // --- network-backed actions ---

    async fn refresh_lists(&mut self) {
        match self.client.lists().await {
            Ok(lists) => {
                self.lists = lists;
                self.clamp_list_selection();
            }
            Err(err) => self.report(err),
        }
    }

    async fn open_selected_list(&mut self) {
        let Some(list) = self
            .list_state
            .selected()
            .and_then(|i| self.lists.get(i))
            .cloned()
        else {
            return;
        };
        match self.client.items(list.id).await {
            Ok(tasks) => {
                self.current_list = Some(list);
                self.tasks = tasks;
                self.query = Query::default();
                self.search_input.clear();
                self.task_state = ListState::default();
                self.clamp_task_selection();
                self.screen = Screen::Tasks;
            }
            Err(err) => self.report(err),
        }
    }

    async fn refresh_tasks(&mut self) {
        let Some(list_id) = self.current_list.as_ref().map(|l| l.id) else {
            return;
        };
        match self.client.items(list_id).await {
            Ok(tasks) => {
                self.tasks = tasks;
                // reconcile the cached count with server truth
                if let Some(list) = self.current_list.as_mut() {
                    list.item_count = self.tasks.len() as i64;
                }
                self.clamp_task_selection();
            }
            Err(err) => self.report(err),
        }
    }

    async fn submit_login(&mut self) {
        let errors = validate_login(&self.login_username, &self.login_password);
        if !errors.is_empty() {
            self.status_line = Some(join_errors(&errors));
            return;
        }
        let username = self.login_username.clone();
        let password = self.login_password.clone();
        match self.client.login(&username, &password).await {
            Ok(()) => {
                self.login_password.clear();
                self.status_line = None;
                self.screen = Screen::Lists;
                self.refresh_lists().await;
            }
            Err(err) => self.report(err),
        }
    }

    async fn submit_signup(&mut self) {
        let errors = validate_signup(&self.signup_form);
        if !errors.is_empty() {
            self.status_line = Some(join_errors(&errors));
            return;
        }
        let profile = crate::models::SignupProfile {
            username: self.signup_form.username.clone(),
            email: self.signup_form.email.clone(),
            password: self.signup_form.password.clone(),
            first_name: None,
            last_name: None,
        };
        match self.client.signup(&profile).await {
            Ok(account) => {
                // signup never logs the user in; hand them back to login
                self.login_username = account.username;
                self.signup_form = SignupForm::default();
                self.status_line = Some("Account created, please log in".to_string());
                self.screen = Screen::Login;
                self.login_focus = LoginField::Password;
            }
            Err(err) => self.report(err),
        }
    }

    // One form, two endpoints: create when editing_list is None, update
    // the named list otherwise.
    async fn submit_list_form(&mut self) {
        if self.new_list_name.trim().is_empty() {
            self.status_line = Some("List name cannot be empty".to_string());
            return;
        }
        let payload = ListPayload {
            name: self.new_list_name.trim().to_string(),
            description: if self.new_list_description.trim().is_empty() {
                None
            } else {
                Some(self.new_list_description.trim().to_string())
            },
        };
        let result = match self.editing_list {
            Some(list_id) => self.client.update_list(list_id, &payload).await,
            None => self.client.create_list(&payload).await,
        };
        match result {
            Ok(saved) => {
                if self.editing_list.take().is_some() {
                    self.apply_updated_list(saved);
                } else {
                    self.lists.push(saved);
                }
                self.new_list_name.clear();
                self.new_list_description.clear();
                self.input_mode = InputMode::Normal;
                self.clamp_list_selection();
            }
            Err(err) => self.report(err),
        }
    }

    pub fn apply_updated_list(&mut self, list: TodoList) {
        if let Some(slot) = self.lists.iter_mut().find(|l| l.id == list.id) {
            *slot = list;
        }
    }

    async fn delete_selected_list(&mut self) {
        let Some(list_id) = self
            .list_state
            .selected()
            .and_then(|i| self.lists.get(i))
            .map(|l| l.id)
        else {
            return;
        };
        match self.client.delete_list(list_id).await {
            Ok(()) => {
                self.lists.retain(|l| l.id != list_id);
                self.clamp_list_selection();
            }
            Err(err) => self.report(err),
        }
    }

    async fn submit_new_task(&mut self) {
        let parsed = parse_task_input(&self.new_task_input);
        if parsed.title.is_empty() {
            self.status_line = Some("Task title cannot be empty".to_string());
            return;
        }
        let Some(list_id) = self.current_list.as_ref().map(|l| l.id) else {
            return;
        };
        let item = NewTask {
            title: parsed.title,
            description: None,
            priority: parsed.priority,
            due_date: parsed.due_date,
        };
        match self.client.create_item(list_id, &item).await {
            Ok(created) => {
                self.apply_created_task(created);
                self.new_task_input.clear();
                self.input_mode = InputMode::Normal;
            }
            Err(err) => self.report(err),
        }
    }

    async fn toggle_selected_task(&mut self) {
        let Some(task) = self
            .task_state
            .selected()
            .and_then(|i| self.visible_tasks().into_iter().nth(i))
        else {
            return;
        };
        let Some(list_id) = self.current_list.as_ref().map(|l| l.id) else {
            return;
        };
        let patch = TaskPatch::completion(!task.completed);
        match self.client.update_item(list_id, task.id, &patch).await {
            Ok(updated) => self.apply_updated_task(updated),
            Err(err) => self.report(err),
        }
    }

    async fn delete_selected_task(&mut self) {
        let Some(task_id) = self
            .task_state
            .selected()
            .and_then(|i| self.visible_tasks().into_iter().nth(i))
            .map(|t| t.id)
        else {
            return;
        };
        let Some(list_id) = self.current_list.as_ref().map(|l| l.id) else {
            return;
        };
        match self.client.delete_item(list_id, task_id).await {
            Ok(()) => self.apply_deleted_task(task_id),
            Err(err) => self.report(err),
        }
    }

    // --- input handling ---

    pub async fn handle_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        self.status_line = None;
        match self.screen {
            Screen::Login => self.handle_login_input(key).await,
            Screen::Signup => self.handle_signup_input(key).await,
            Screen::Lists => self.handle_lists_input(key).await,
            Screen::Tasks => self.handle_tasks_input(key).await,
        }
    }

    async fn handle_login_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        match key.code {
            KeyCode::Esc => return Ok(true),
            KeyCode::F(2) => {
                self.screen = Screen::Signup;
            }
            KeyCode::Tab => {
                self.login_focus = match self.login_focus {
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Username,
                };
            }
            KeyCode::Enter => self.submit_login().await,
            KeyCode::Char(c) => match self.login_focus {
                LoginField::Username => self.login_username.push(c),
                LoginField::Password => self.login_password.push(c),
            },
            KeyCode::Backspace => {
                match self.login_focus {
                    LoginField::Username => self.login_username.pop(),
                    LoginField::Password => self.login_password.pop(),
                };
            }
            _ => {}
        }
        Ok(false)
    }

    async fn handle_signup_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        match key.code {
            KeyCode::Esc | KeyCode::F(2) => {
                self.screen = Screen::Login;
            }
            KeyCode::Tab => {
                self.signup_focus = self.signup_focus.next();
            }
            KeyCode::Enter => self.submit_signup().await,
            KeyCode::Char(c) => self.signup_field_mut().push(c),
            KeyCode::Backspace => {
                self.signup_field_mut().pop();
            }
            _ => {}
        }
        Ok(false)
    }

    fn signup_field_mut(&mut self) -> &mut String {
        match self.signup_focus {
            SignupField::Username => &mut self.signup_form.username,
            SignupField::Email => &mut self.signup_form.email,
            SignupField::Password => &mut self.signup_form.password,
            SignupField::Confirm => &mut self.signup_form.confirm_password,
        }
    }

    async fn handle_lists_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Char('j') | KeyCode::Down => {
                    select_next(&mut self.list_state, self.lists.len())
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    select_previous(&mut self.list_state, self.lists.len())
                }
                KeyCode::Char('r') => self.refresh_lists().await,
                KeyCode::Char('a') => {
                    self.input_mode = InputMode::Editing;
                    self.editing_list = None;
                    self.new_list_name.clear();
                    self.new_list_description.clear();
                    self.active_list_input = ActiveInput::Name;
                }
                KeyCode::Char('e') => {
                    if let Some(list) = self
                        .list_state
                        .selected()
                        .and_then(|i| self.lists.get(i))
                        .cloned()
                    {
                        self.editing_list = Some(list.id);
                        self.new_list_name = list.name;
                        self.new_list_description = list.description.unwrap_or_default();
                        self.active_list_input = ActiveInput::Name;
                        self.input_mode = InputMode::Editing;
                    }
                }
                KeyCode::Char('d') => self.delete_selected_list().await,
                KeyCode::Char('o') => {
                    self.client.logout();
                    self.screen = Screen::Login;
                }
                KeyCode::Enter => self.open_selected_list().await,
                _ => {}
            },
            InputMode::Editing => match key.code {
                KeyCode::Tab => {
                    self.active_list_input = match self.active_list_input {
                        ActiveInput::Name => ActiveInput::Description,
                        ActiveInput::Description => ActiveInput::Name,
                    };
                }
                KeyCode::Enter => self.submit_list_form().await,
                KeyCode::Esc => {
                    self.editing_list = None;
                    self.new_list_name.clear();
                    self.new_list_description.clear();
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Char(c) => match self.active_list_input {
                    ActiveInput::Name => self.new_list_name.push(c),
                    ActiveInput::Description => self.new_list_description.push(c),
                },
                KeyCode::Backspace => {
                    match self.active_list_input {
                        ActiveInput::Name => self.new_list_name.pop(),
                        ActiveInput::Description => self.new_list_description.pop(),
                    };
                }
                _ => {}
            },
            InputMode::Search => {
                // search only exists on the task screen
                self.input_mode = InputMode::Normal;
            }
        }
        Ok(false)
    }

    async fn handle_tasks_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Esc | KeyCode::Char('h') => {
                    self.screen = Screen::Lists;
                    self.current_list = None;
                    self.tasks.clear();
                    // pick up authoritative item counts
                    self.refresh_lists().await;
                }
                KeyCode::Char('j') | KeyCode::Down => {
                    let len = self.visible_tasks().len();
                    select_next(&mut self.task_state, len);
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    let len = self.visible_tasks().len();
                    select_previous(&mut self.task_state, len);
                }
                KeyCode::Char(' ') => self.toggle_selected_task().await,
                KeyCode::Char('d') => self.delete_selected_task().await,
                KeyCode::Char('r') => self.refresh_tasks().await,
                KeyCode::Char('a') => {
                    self.input_mode = InputMode::Editing;
                    self.new_task_input.clear();
                }
                KeyCode::Char('/') => {
                    self.input_mode = InputMode::Search;
                }
                KeyCode::Char('f') => {
                    self.query = self.query.clone().with_status(self.query.status.next());
                    self.clamp_task_selection();
                }
                KeyCode::Char('p') => {
                    let next = cycle_priority(self.query.priority);
                    self.query = self.query.clone().with_priority(next);
                    self.clamp_task_selection();
                }
                KeyCode::Char('1') => {
                    self.query = self.query.clone().toggle_sort(SortKey::DueDate);
                }
                KeyCode::Char('2') => {
                    self.query = self.query.clone().toggle_sort(SortKey::Priority);
                }
                KeyCode::Char('3') => {
                    self.query = self.query.clone().toggle_sort(SortKey::CreatedAt);
                }
                KeyCode::Char('c') => {
                    self.query = self.query.clone().clear_filters();
                    self.search_input.clear();
                    self.clamp_task_selection();
                }
                _ => {}
            },
            InputMode::Editing => match key.code {
                KeyCode::Enter => self.submit_new_task().await,
                KeyCode::Esc => {
                    self.new_task_input.clear();
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Char(c) => self.new_task_input.push(c),
                KeyCode::Backspace => {
                    self.new_task_input.pop();
                }
                _ => {}
            },
            InputMode::Search => match key.code {
                KeyCode::Enter => {
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Esc => {
                    self.search_input.clear();
                    self.query = self.query.clone().with_search("");
                    self.input_mode = InputMode::Normal;
                    self.clamp_task_selection();
                }
                KeyCode::Char(c) => {
                    self.search_input.push(c);
                    self.query = self.query.clone().with_search(self.search_input.clone());
                    self.clamp_task_selection();
                }
                KeyCode::Backspace => {
                    self.search_input.pop();
                    self.query = self.query.clone().with_search(self.search_input.clone());
                    self.clamp_task_selection();
                }
                _ => {}
            },
        }
        Ok(false)
    }
}

fn join_errors(errors: &crate::validation::FieldErrors) -> String {
    errors
        .values()
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

fn cycle_priority(current: Option<Priority>) -> Option<Priority> {
    match current {
        None => Some(Priority::Low),
        Some(Priority::Low) => Some(Priority::Medium),
        Some(Priority::Medium) => Some(Priority::High),
        Some(Priority::High) => Some(Priority::Urgent),
        Some(Priority::Urgent) => None,
    }
}

fn clamp_selection(state: &mut ListState, len: usize) {
    if len == 0 {
        state.select(None);
        return;
    }
    match state.selected() {
        Some(i) if i >= len => state.select(Some(len - 1)),
        None => state.select(Some(0)),
        _ => {}
    }
}

fn select_next(state: &mut ListState, len: usize) {
    if len == 0 {
        state.select(None);
        return;
    }
    let i = match state.selected() {
        Some(i) => {
            if i >= len - 1 {
                0
            } else {
                i + 1
            }
        }
        None => 0,
    };
    state.select(Some(i));
}

fn select_previous(state: &mut ListState, len: usize) {
    if len == 0 {
        state.select(None);
        return;
    }
    let i = match state.selected() {
        Some(i) => {
            if i == 0 {
                len - 1
            } else {
                i - 1
            }
        }
        None => 0,
    };
    state.select(Some(i));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn dt(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn sample_task(id: u64, completed: bool) -> Task {
        Task {
            id,
            title: format!("Task {}", id),
            description: String::new(),
            completed,
            priority: Priority::Medium,
            due_date: None,
            created_at: dt(&format!("2024-01-{:02}T08:00:00Z", id)),
            updated_at: dt(&format!("2024-01-{:02}T08:00:00Z", id)),
            list_id: 1,
        }
    }

    fn sample_list() -> TodoList {
        TodoList {
            id: 1,
            name: "Chores".to_string(),
            description: None,
            item_count: 0,
            created_at: dt("2024-01-01T00:00:00Z"),
            updated_at: dt("2024-01-01T00:00:00Z"),
        }
    }

    fn app_with_tasks(tasks: Vec<Task>) -> App {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:1"));
        let mut list = sample_list();
        list.item_count = tasks.len() as i64;
        app.current_list = Some(list);
        app.tasks = tasks;
        app
    }

    #[test]
    fn create_appends_and_bumps_the_count() {
        let mut app = app_with_tasks(vec![sample_task(1, false)]);
        app.apply_created_task(sample_task(2, false));
        assert_eq!(app.tasks.len(), 2);
        assert_eq!(app.current_list.as_ref().unwrap().item_count, 2);
    }

    #[test]
    fn update_replaces_the_matching_record() {
        let mut app = app_with_tasks(vec![sample_task(1, false), sample_task(2, false)]);
        let mut updated = sample_task(2, true);
        updated.title = "Renamed".to_string();
        app.apply_updated_task(updated);
        assert_eq!(app.tasks.len(), 2);
        assert!(app.tasks[1].completed);
        assert_eq!(app.tasks[1].title, "Renamed");
        // the count only moves on create/delete
        assert_eq!(app.current_list.as_ref().unwrap().item_count, 2);
    }

    #[test]
    fn list_edit_replaces_the_matching_record() {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:1"));
        app.lists = vec![sample_list()];
        let mut renamed = sample_list();
        renamed.name = "Errands".to_string();
        renamed.description = Some("weekend only".to_string());
        app.apply_updated_list(renamed);
        assert_eq!(app.lists.len(), 1);
        assert_eq!(app.lists[0].name, "Errands");
        assert_eq!(app.lists[0].description.as_deref(), Some("weekend only"));
    }

    #[tokio::test]
    async fn edit_key_prefills_the_list_form() {
        let mut app = App::new(ApiClient::new("http://127.0.0.1:1"));
        app.screen = Screen::Lists;
        let mut list = sample_list();
        list.description = Some("weekend errands".to_string());
        app.lists = vec![list];
        app.list_state.select(Some(0));

        let key = KeyEvent::new(KeyCode::Char('e'), crossterm::event::KeyModifiers::NONE);
        app.handle_input(key).await.unwrap();

        assert!(matches!(app.input_mode, InputMode::Editing));
        assert_eq!(app.editing_list, Some(1));
        assert_eq!(app.new_list_name, "Chores");
        assert_eq!(app.new_list_description, "weekend errands");
    }

    #[test]
    fn delete_removes_and_drops_the_count() {
        let mut app = app_with_tasks(vec![sample_task(1, false), sample_task(2, true)]);
        app.apply_deleted_task(1);
        assert_eq!(app.tasks.len(), 1);
        assert_eq!(app.tasks[0].id, 2);
        assert_eq!(app.current_list.as_ref().unwrap().item_count, 1);
    }

    #[test]
    fn progress_counts_the_full_collection_not_the_view() {
        let mut app = app_with_tasks(vec![sample_task(1, false), sample_task(2, true)]);
        app.query = app
            .query
            .clone()
            .with_status(crate::query::StatusFilter::Active);
        assert_eq!(app.visible_tasks().len(), 1);
        let counts = app.progress();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.completed, 1);
    }

    #[test]
    fn selection_is_clamped_when_the_view_shrinks() {
        let mut app = app_with_tasks(vec![
            sample_task(1, false),
            sample_task(2, false),
            sample_task(3, false),
        ]);
        app.task_state.select(Some(2));
        app.apply_deleted_task(3);
        app.apply_deleted_task(2);
        assert_eq!(app.task_state.selected(), Some(0));
        app.apply_deleted_task(1);
        assert_eq!(app.task_state.selected(), None);
    }

    #[test]
    fn priority_filter_cycles_through_every_rank_and_back() {
        let mut current = None;
        let mut seen = Vec::new();
        for _ in 0..5 {
            current = cycle_priority(current);
            seen.push(current);
        }
        assert_eq!(
            seen,
            vec![
                Some(Priority::Low),
                Some(Priority::Medium),
                Some(Priority::High),
                Some(Priority::Urgent),
                None,
            ]
        );
    }

    #[test]
    fn wrap_around_selection() {
        let mut state = ListState::default();
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(0));
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(1));
        select_next(&mut state, 2);
        assert_eq!(state.selected(), Some(0));
        select_previous(&mut state, 2);
        assert_eq!(state.selected(), Some(1));

        let mut empty = ListState::default();
        select_next(&mut empty, 0);
        assert_eq!(empty.selected(), None);
    }
}
