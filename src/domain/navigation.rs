//! Screen state machine
//!
//! `transition` is pure: it maps the current state and a user or platform
//! event to the next state plus a list of side effects. The presentation layer
//! renders whatever screen the state names and carries out the effects.

use crate::domain::settings::{TOGGLE_ARDUINO, TOGGLE_AUTO};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Camera,
    Gallery,
    Settings,
    Compass,
    Help,
    /// Shows the frame that was just captured
    Preview,
    /// Single gallery photo with rename/delete
    Detail,
}

impl Screen {
    /// Screens reachable from the top bar
    pub const TOP_LEVEL: [Screen; 5] = [
        Screen::Compass,
        Screen::Camera,
        Screen::Gallery,
        Screen::Settings,
        Screen::Help,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::Gallery => "Gallery",
            Self::Settings => "Settings",
            Self::Compass => "Compass",
            Self::Help => "Help",
            Self::Preview => "Preview",
            Self::Detail => "Photo",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub screen: Screen,
    /// Where `Back` goes from Help and Detail
    pub return_to: Option<Screen>,
    pub selected_photo: Option<PathBuf>,
    /// Inline message shown in place of the screen body
    pub notice: Option<String>,
    pub auto_scan: bool,
}

impl UiState {
    pub fn new(screen: Screen, auto_scan: bool) -> Self {
        Self {
            screen,
            return_to: None,
            selected_photo: None,
            notice: None,
            auto_scan,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Show(Screen),
    Back,
    Capture,
    Captured(PathBuf),
    OpenPhoto(PathBuf),
    RenamePhoto { path: PathBuf, new_name: String },
    DeletePhoto(PathBuf),
    /// A photo operation failed; the message goes to the log
    PhotoFailed(String),
    ToggleChanged { key: String, value: bool },
    StartScan,
    CancelScan,
    PermissionDenied(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartBleScan,
    StopBle,
    SetBlePreference(bool),
    SavePhoto,
    RenamePhoto { path: PathBuf, new_name: String },
    DeletePhoto(PathBuf),
    RefreshGallery,
    PersistToggle { key: String, value: bool },
    Log(String),
}

pub fn transition(state: &UiState, event: UiEvent) -> (UiState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        UiEvent::Show(Screen::Help) => {
            if state.screen != Screen::Help {
                next.return_to = Some(state.screen);
            }
            next.screen = Screen::Help;
        }
        UiEvent::Show(screen) => {
            next = UiState::new(screen, state.auto_scan);
            match screen {
                Screen::Compass if state.screen != Screen::Compass && state.auto_scan => {
                    effects.push(Effect::StartBleScan);
                }
                Screen::Gallery => effects.push(Effect::RefreshGallery),
                _ => {}
            }
        }
        UiEvent::Back => match state.screen {
            Screen::Help | Screen::Detail => {
                next.screen = state.return_to.unwrap_or(Screen::Compass);
                next.return_to = None;
                next.selected_photo = None;
                if next.screen == Screen::Gallery {
                    effects.push(Effect::RefreshGallery);
                }
            }
            Screen::Preview => {
                next.screen = Screen::Camera;
                next.selected_photo = None;
            }
            _ => {}
        },
        UiEvent::Capture => {
            if state.screen == Screen::Camera {
                effects.push(Effect::SavePhoto);
            }
        }
        UiEvent::Captured(path) => {
            next.screen = Screen::Preview;
            effects.push(Effect::Log(format!("Saved {}", path.display())));
            next.selected_photo = Some(path);
        }
        UiEvent::OpenPhoto(path) => {
            next.screen = Screen::Detail;
            next.return_to = Some(Screen::Gallery);
            next.selected_photo = Some(path);
        }
        UiEvent::RenamePhoto { path, new_name } => {
            effects.push(Effect::RenamePhoto { path, new_name });
            effects.push(Effect::RefreshGallery);
            next = UiState::new(Screen::Gallery, state.auto_scan);
        }
        UiEvent::DeletePhoto(path) => {
            effects.push(Effect::DeletePhoto(path));
            effects.push(Effect::RefreshGallery);
            next = UiState::new(Screen::Gallery, state.auto_scan);
        }
        UiEvent::PhotoFailed(message) => {
            effects.push(Effect::Log(message));
            effects.push(Effect::RefreshGallery);
            next = UiState::new(Screen::Gallery, state.auto_scan);
        }
        UiEvent::ToggleChanged { key, value } => {
            if key == TOGGLE_AUTO {
                next.auto_scan = value;
            } else if key == TOGGLE_ARDUINO {
                effects.push(Effect::SetBlePreference(value));
            }
            effects.push(Effect::PersistToggle { key, value });
        }
        UiEvent::StartScan => effects.push(Effect::StartBleScan),
        UiEvent::CancelScan => effects.push(Effect::StopBle),
        UiEvent::PermissionDenied(message) => {
            effects.push(Effect::Log(message.clone()));
            next.notice = Some(message);
        }
    }

    (next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(screen: Screen) -> UiState {
        UiState::new(screen, false)
    }

    #[test]
    fn test_top_level_navigation_resets_detail_state() {
        let mut current = state(Screen::Detail);
        current.selected_photo = Some(PathBuf::from("a.jpg"));
        current.notice = Some("denied".into());

        let (next, effects) = transition(&current, UiEvent::Show(Screen::Settings));
        assert_eq!(next.screen, Screen::Settings);
        assert_eq!(next.selected_photo, None);
        assert_eq!(next.notice, None);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_auto_scan_on_entering_compass() {
        let current = UiState::new(Screen::Camera, true);
        let (next, effects) = transition(&current, UiEvent::Show(Screen::Compass));
        assert_eq!(next.screen, Screen::Compass);
        assert_eq!(effects, vec![Effect::StartBleScan]);

        // Already on the compass: no second scan
        let (_, effects) = transition(&next, UiEvent::Show(Screen::Compass));
        assert!(effects.is_empty());

        let (_, effects) = transition(&state(Screen::Camera), UiEvent::Show(Screen::Compass));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_help_returns_to_origin() {
        let (help, _) = transition(&state(Screen::Gallery), UiEvent::Show(Screen::Help));
        assert_eq!(help.screen, Screen::Help);
        let (back, effects) = transition(&help, UiEvent::Back);
        assert_eq!(back.screen, Screen::Gallery);
        assert_eq!(effects, vec![Effect::RefreshGallery]);

        let (help, _) = transition(&state(Screen::Compass), UiEvent::Show(Screen::Help));
        let (again, _) = transition(&help, UiEvent::Show(Screen::Help));
        assert_eq!(again.return_to, Some(Screen::Compass));
    }

    #[test]
    fn test_capture_flow() {
        let camera = state(Screen::Camera);
        let (_, effects) = transition(&camera, UiEvent::Capture);
        assert_eq!(effects, vec![Effect::SavePhoto]);

        let (_, effects) = transition(&state(Screen::Gallery), UiEvent::Capture);
        assert!(effects.is_empty());

        let (preview, effects) = transition(&camera, UiEvent::Captured(PathBuf::from("scan_1.jpg")));
        assert_eq!(preview.screen, Screen::Preview);
        assert_eq!(preview.selected_photo, Some(PathBuf::from("scan_1.jpg")));
        assert_eq!(effects.len(), 1);

        let (back, _) = transition(&preview, UiEvent::Back);
        assert_eq!(back.screen, Screen::Camera);
    }

    #[test]
    fn test_photo_actions_return_to_gallery() {
        let (detail, _) = transition(
            &state(Screen::Gallery),
            UiEvent::OpenPhoto(PathBuf::from("a.jpg")),
        );
        assert_eq!(detail.screen, Screen::Detail);

        let (next, effects) = transition(
            &detail,
            UiEvent::RenamePhoto {
                path: PathBuf::from("a.jpg"),
                new_name: "b".into(),
            },
        );
        assert_eq!(next.screen, Screen::Gallery);
        assert_eq!(
            effects[0],
            Effect::RenamePhoto {
                path: PathBuf::from("a.jpg"),
                new_name: "b".into()
            }
        );

        let (next, effects) = transition(&detail, UiEvent::DeletePhoto(PathBuf::from("a.jpg")));
        assert_eq!(next.screen, Screen::Gallery);
        assert_eq!(effects[0], Effect::DeletePhoto(PathBuf::from("a.jpg")));

        let (next, effects) = transition(&detail, UiEvent::PhotoFailed("disk full".into()));
        assert_eq!(next.screen, Screen::Gallery);
        assert_eq!(effects[0], Effect::Log("disk full".into()));
    }

    #[test]
    fn test_toggles() {
        let current = state(Screen::Settings);
        let (next, effects) = transition(
            &current,
            UiEvent::ToggleChanged {
                key: TOGGLE_AUTO.into(),
                value: true,
            },
        );
        assert!(next.auto_scan);
        assert_eq!(
            effects,
            vec![Effect::PersistToggle {
                key: TOGGLE_AUTO.into(),
                value: true
            }]
        );

        let (_, effects) = transition(
            &current,
            UiEvent::ToggleChanged {
                key: TOGGLE_ARDUINO.into(),
                value: false,
            },
        );
        assert_eq!(effects[0], Effect::SetBlePreference(false));
    }

    #[test]
    fn test_permission_denied_sets_notice() {
        let (next, effects) = transition(
            &state(Screen::Camera),
            UiEvent::PermissionDenied("Camera permission not granted".into()),
        );
        assert_eq!(next.screen, Screen::Camera);
        assert_eq!(next.notice.as_deref(), Some("Camera permission not granted"));
        assert_eq!(effects.len(), 1);
    }
}
