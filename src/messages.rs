//! Fixed interface strings in each supported language.

use crate::models::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    LoadFailed,
    NoTickets,
    SessionWarningTitle,
    SessionWarningHint,
    SessionContinued,
    SessionExpired,
    LoggedIn,
    LoggedOut,
    NotLoggedIn,
    AdminOnly,
    Watching,
    NoNotifications,
    SessionRemaining,
    AdminCannotCreate,
}

impl Message {
    pub fn text(self, lang: Language) -> &'static str {
        match (self, lang) {
            (Message::LoadFailed, Language::Es) => "No se pudieron cargar los tickets",
            (Message::LoadFailed, Language::En) => "Could not load tickets",
            (Message::NoTickets, Language::Es) => "No hay tickets.",
            (Message::NoTickets, Language::En) => "No tickets found.",
            (Message::SessionWarningTitle, Language::Es) => "Tu sesión está por expirar",
            (Message::SessionWarningTitle, Language::En) => "Your session is about to expire",
            (Message::SessionWarningHint, Language::Es) => {
                "Escribe 'c' para continuar o 'q' para cerrar sesión."
            }
            (Message::SessionWarningHint, Language::En) => {
                "Type 'c' to continue or 'q' to log out."
            }
            (Message::SessionContinued, Language::Es) => "Sesión extendida.",
            (Message::SessionContinued, Language::En) => "Session extended.",
            (Message::SessionExpired, Language::Es) => {
                "Tu sesión ha expirado por inactividad. Inicia sesión nuevamente."
            }
            (Message::SessionExpired, Language::En) => {
                "Your session expired due to inactivity. Please log in again."
            }
            (Message::LoggedIn, Language::Es) => "Sesión iniciada como",
            (Message::LoggedIn, Language::En) => "Logged in as",
            (Message::LoggedOut, Language::Es) => "Sesión cerrada.",
            (Message::LoggedOut, Language::En) => "Logged out.",
            (Message::NotLoggedIn, Language::Es) => {
                "No has iniciado sesión. Ejecuta 'ticketwatch login' primero."
            }
            (Message::NotLoggedIn, Language::En) => "Not logged in. Run 'ticketwatch login' first.",
            (Message::AdminOnly, Language::Es) => "Solo un superusuario puede modificar tickets.",
            (Message::AdminOnly, Language::En) => "Only a superuser can modify tickets.",
            (Message::Watching, Language::Es) => {
                "Vigilando tickets. 'n' lista las notificaciones, 'd <id>' descarta una, \
                 'q' cierra sesión."
            }
            (Message::Watching, Language::En) => {
                "Watching tickets. 'n' lists notifications, 'd <id>' dismisses one, \
                 'q' logs out."
            }
            (Message::NoNotifications, Language::Es) => "No hay notificaciones activas.",
            (Message::NoNotifications, Language::En) => "No active notifications.",
            (Message::SessionRemaining, Language::Es) => "La sesión expira en",
            (Message::SessionRemaining, Language::En) => "Session expires in",
            (Message::AdminCannotCreate, Language::Es) => {
                "Los administradores no pueden crear tickets."
            }
            (Message::AdminCannotCreate, Language::En) => "Administrators cannot create tickets.",
        }
    }
}
