//! Terminal front-end state: current route, episode board, play view.
use crate::capture::CpalCapture;
use crate::command::{HELP, UserCommand};
use evertalk_client::types::ChatTurn;
use evertalk_core::api::EvertalkApi;
use evertalk_core::episode::{EpisodeBoard, EpisodeError, EpisodeStatus};
use evertalk_core::play::PlaySession;
use evertalk_core::recording::RecordingController;
use evertalk_core::routes::{self, Navigation, Route};
use evertalk_core::{Command, Input, Notifier, Session, SessionContext, boot, profile};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<A: EvertalkApi + ?Sized> {
    api: Arc<A>,
    session: SessionContext,
    notifier: Arc<dyn Notifier>,
    board: EpisodeBoard<A>,
    play: Option<PlaySession<A>>,
    recorder: Option<mpsc::Sender<Input>>,
    /// Generation of the mounted recording controller; uploads tagged with
    /// any other one are dropped.
    recorder_generation: u64,
    commands: mpsc::Sender<Command>,
    route: Route,
    login_url: String,
    input_device: Option<String>,
    completion_delay: Duration,
}

impl<A: EvertalkApi + ?Sized + 'static> App<A> {
    pub fn new(
        api: Arc<A>,
        session: SessionContext,
        notifier: Arc<dyn Notifier>,
        commands: mpsc::Sender<Command>,
        login_url: String,
    ) -> Self {
        Self {
            board: EpisodeBoard::new(api.clone()),
            api,
            session,
            notifier,
            play: None,
            recorder: None,
            recorder_generation: 0,
            commands,
            route: Route::Login,
            login_url,
            input_device: None,
            completion_delay: evertalk_core::play::COMPLETION_DELAY,
        }
    }

    pub fn with_input_device(mut self, input_device: Option<String>) -> Self {
        self.input_device = input_device;
        self
    }

    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Runs the start-up auth check and lands on the matching page.
    pub async fn boot(&mut self) {
        let outcome = boot::boot(&*self.api, &self.session, &*self.notifier).await;
        self.enter(outcome.landing()).await;
    }

    pub async fn handle(&mut self, command: UserCommand) -> Flow {
        match command {
            UserCommand::Help => println!("{HELP}"),
            UserCommand::Episodes => self.navigate(Route::Home.path()).await,
            UserCommand::Select(id) => match self.board.select(id) {
                Ok(()) => println!("selected episode {id}"),
                Err(e) => println!("{e}"),
            },
            UserCommand::Start(id) => self.start(id).await,
            UserCommand::Talk => self.toggle_recording().await,
            UserCommand::Profile { nickname, gender } => {
                match profile::submit_profile(&*self.api, &self.session, &nickname, gender).await {
                    Ok(()) => self.navigate(Route::Home.path()).await,
                    Err(e) => println!("could not save profile: {e}"),
                }
            }
            UserCommand::Goto(path) => self.navigate(&path).await,
            UserCommand::Login => self.login().await,
            UserCommand::Logout => {
                self.unmount_play().await;
                boot::logout(&*self.api, &self.session).await;
                self.enter(Route::Login).await;
            }
            UserCommand::Status => self.print_status(),
            UserCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Carries out what the recording controller asked for.
    pub async fn handle_recording(&mut self, command: Command) {
        match command {
            Command::Notify(notice) => self.notifier.notify(notice),
            Command::Upload {
                generation,
                recording,
            } => {
                if self.recorder.is_none() || generation != self.recorder_generation {
                    tracing::warn!(
                        "recording from controller {} is stale (current {}), dropping it",
                        generation,
                        self.recorder_generation
                    );
                    return;
                }
                let Some(play) = self.play.as_mut() else {
                    tracing::warn!("recording finished without an active episode, dropping it");
                    return;
                };
                if !recording.transcript.is_empty() {
                    println!("you: {}", recording.transcript);
                }
                println!("(sending...)");
                match play.submit(recording).await {
                    Ok(_) => print_turn(play.turn(), play.affection()),
                    Err(e) => println!("could not send your answer: {e}"),
                }
            }
        }
    }

    /// Reacts to session changes made elsewhere, e.g. by a failed refresh.
    pub async fn on_session_change(&mut self, session: Session) {
        if !session.is_logged_in && self.route != Route::Login {
            tracing::info!("session ended, returning to login");
            self.enter(Route::Login).await;
        }
    }

    async fn login(&mut self) {
        if let Err(e) = self.api.login().await {
            tracing::warn!("login entry unreachable: {}", e);
            println!("could not reach the login page: {e}");
        }
        println!("log in at {}", self.login_url);
    }

    pub async fn shutdown(&mut self) {
        self.unmount_play().await;
        self.play = None;
    }

    async fn navigate(&mut self, path: &str) {
        match routes::resolve(path, self.session.is_logged_in()) {
            Navigation::Allow(route) => self.enter(route).await,
            Navigation::Redirect(route) => {
                println!("redirected to {route}");
                self.enter(route).await;
            }
            Navigation::NotFound => println!("page not found: {path}"),
        }
    }

    async fn enter(&mut self, route: Route) {
        let route = if route == Route::Play && self.play.is_none() {
            Route::Episode
        } else {
            route
        };
        if self.route == Route::Play && route != Route::Play {
            self.unmount_play().await;
        }
        self.route = route;
        tracing::debug!("route {}", route);

        match route {
            Route::Home | Route::Episode => self.show_episodes().await,
            Route::Play => {
                if let Some(play) = &self.play {
                    print_turn(play.turn(), play.affection());
                }
            }
            Route::Login => println!("not logged in; type `login` for the login address"),
            Route::Entry => println!("set up your profile: profile <nickname> <male|female>"),
        }
    }

    async fn show_episodes(&mut self) {
        let progress = match self.board.get_episode_list().await {
            Ok(progress) => progress,
            Err(e) => {
                println!("could not load episodes: {e}");
                return;
            }
        };
        println!("affection: {}/100", progress.affection());
        for episode in &progress.episodes {
            let status = match progress.status(episode.id) {
                EpisodeStatus::Completed => "done",
                EpisodeStatus::Available => "new",
                EpisodeStatus::Locked => "locked",
            };
            println!("  {:>2}. {} [{}]", episode.id, episode.title, status);
        }
    }

    async fn start(&mut self, id: Option<u32>) {
        if self.board.progress().is_none() {
            if let Err(e) = self.board.get_episode_list().await {
                println!("could not load episodes: {e}");
                return;
            }
        }

        let started = match id {
            Some(id) => self.board.start_episode(id).await,
            None => self.board.start_selected().await,
        };
        let session = match started {
            Ok(session) => session,
            Err(EpisodeError::Locked(id)) => {
                println!("episode {id} is locked");
                return;
            }
            Err(e) => {
                println!("could not start the episode: {e}");
                return;
            }
        };

        self.unmount_play().await;
        self.board.clear_selection();
        self.play = Some(
            PlaySession::new(self.api.clone(), self.notifier.clone(), session)
                .with_completion_delay(self.completion_delay),
        );
        self.mount_recorder();
        self.enter(Route::Play).await;
    }

    fn mount_recorder(&mut self) {
        let (input_tx, input_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let capture = CpalCapture::new(self.input_device.clone(), event_tx);
        self.recorder_generation += 1;
        let controller = RecordingController::new(capture).with_generation(self.recorder_generation);
        tokio::task::spawn_local(controller.run(input_rx, event_rx, self.commands.clone()));
        self.recorder = Some(input_tx);
    }

    async fn unmount_play(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            if recorder.send(Input::Unmount).await.is_err() {
                tracing::debug!("recording controller already stopped");
            }
        }
    }

    async fn toggle_recording(&mut self) {
        let Some(recorder) = self.recorder.as_ref().filter(|_| self.route == Route::Play) else {
            println!("start an episode first");
            return;
        };
        if self.play.as_ref().is_some_and(PlaySession::is_finished) {
            println!("this episode is over; pick the next one with `episodes`");
            return;
        }
        if recorder.send(Input::Toggle).await.is_err() {
            tracing::warn!("recording controller is gone");
            self.recorder = None;
        }
    }

    fn print_status(&self) {
        let session = self.session.snapshot();
        if session.is_logged_in {
            println!("logged in as {:?}", session.user_name);
        } else {
            println!("not logged in");
        }
        println!("page: {}", self.route);
        if let Some(play) = &self.play {
            println!(
                "chat {} with {}, affection {}/100",
                play.chat_id(),
                play.turn().character_name,
                play.affection()
            );
        }
    }
}

fn print_turn(turn: &ChatTurn, affection: u8) {
    match &turn.emotion {
        Some(emotion) => println!("{} ({}): {}", turn.character_name, emotion, turn.chat_text),
        None => println!("{}: {}", turn.character_name, turn.chat_text),
    }
    if let Some(feedback) = turn.feedback_text.as_deref().filter(|f| !f.is_empty()) {
        println!("  feedback: {feedback}");
    }
    println!("  affection: {affection}/100");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use evertalk_client::types::{
        AuthCheck, EpisodeDetail, EpisodeList, EpisodeSession, ProfileUpdate,
    };
    use evertalk_client::{ApiError, AudioAttachment, ChannelNotifier};
    use evertalk_core::recording::Recording;

    mockall::mock! {
        Api {}

        #[async_trait]
        impl EvertalkApi for Api {
            async fn login(&self) -> Result<(), ApiError>;
            async fn check_auth(&self) -> Result<AuthCheck, ApiError>;
            async fn logout(&self) -> Result<(), ApiError>;
            async fn set_profile(&self, update: ProfileUpdate) -> Result<(), ApiError>;
            async fn episode_list(&self) -> Result<EpisodeList, ApiError>;
            async fn start_episode(&self, episode_id: u32) -> Result<EpisodeSession, ApiError>;
            async fn send_chat(&self, chat_id: i64, audio: AudioAttachment) -> Result<ChatTurn, ApiError>;
        }
    }

    fn turn(text: &str) -> ChatTurn {
        ChatTurn {
            character_name: "Haru".into(),
            chat_text: text.into(),
            feedback_text: None,
            emotion: None,
            likeability: 10,
            last_turn: false,
        }
    }

    fn app(api: MockApi) -> App<MockApi> {
        let (notifier, _notices) = ChannelNotifier::new();
        let (commands, _command_rx) = mpsc::channel(8);
        App::new(
            Arc::new(api),
            SessionContext::new(),
            Arc::new(notifier),
            commands,
            "http://localhost/login".into(),
        )
    }

    fn upload(generation: u64) -> Command {
        Command::Upload {
            generation,
            recording: Recording {
                audio: vec![1, 2, 3],
                mime_type: "audio/wav".into(),
                transcript: String::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_login_reaches_public_entry() {
        let mut api = MockApi::new();
        api.expect_login().times(1).returning(|| Ok(()));
        let mut app = app(api);

        assert_eq!(app.handle(UserCommand::Login).await, Flow::Continue);
        assert_eq!(app.route(), Route::Login);
    }

    #[tokio::test]
    async fn test_upload_from_replaced_recorder_is_dropped() {
        let mut api = MockApi::new();
        api.expect_episode_list().times(1).returning(|| {
            Ok(EpisodeList {
                likeability: 10,
                progress: 0,
                episode_detail: vec![EpisodeDetail {
                    episode_id: 1,
                    episode_title: "First day".into(),
                }],
            })
        });
        let mut seq = mockall::Sequence::new();
        for chat_id in [9, 10] {
            api.expect_start_episode()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| {
                    Ok(EpisodeSession {
                        chat_id,
                        turn: turn("Hello"),
                    })
                });
        }
        api.expect_send_chat()
            .withf(|chat_id, _| *chat_id == 10)
            .times(1)
            .returning(|_, _| Ok(turn("Nice to meet you")));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let mut app = app(api);
                app.handle(UserCommand::Start(Some(1))).await;
                app.handle(UserCommand::Start(Some(1))).await;
                assert_eq!(app.route(), Route::Play);

                // Left over from the first play view.
                app.handle_recording(upload(1)).await;
                app.handle_recording(upload(2)).await;

                let play = app.play.as_ref().unwrap();
                assert_eq!(play.chat_id(), 10);
                assert_eq!(play.turn().chat_text, "Nice to meet you");
                app.shutdown().await;
            })
            .await;
    }

    #[tokio::test]
    async fn test_upload_after_unmount_is_dropped() {
        let mut api = MockApi::new();
        api.expect_send_chat().never();
        let mut app = app(api);

        app.handle_recording(upload(0)).await;
        assert!(app.play.is_none());
    }
}
