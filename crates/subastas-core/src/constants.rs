//! Fixed names shared with the auction server and the presentation layer.

/// Outbound channel carrying bidder registrations.
pub const REGISTER_USER_CHANNEL: &str = "register_user";

/// Inbound channel carrying the server's reply to a bidder registration.
pub const USER_REGISTERED_CHANNEL: &str = "user_registered";

/// Admin login endpoint, relative to the HTTP base URL.
pub const ADMIN_LOGIN_PATH: &str = "/api/login-admin";

/// Storage key holding the most recently issued identity.
pub const IDENTITY_STORAGE_KEY: &str = "userId";

/// Auction floor route; the identity is passed as the `userId` query parameter.
pub const AUCTION_FLOOR_PATH: &str = "/auctions";

// ── User-visible messages ───────────────────────────────────────────────────

/// Shown when submit is invoked before a role was chosen.
pub const MSG_NO_ROLE: &str = "Por favor seleccione un rol antes de continuar.";

/// Shown when the persistent connection is not available for a bidder.
pub const MSG_CONNECTION_UNAVAILABLE: &str = "Error: No se pudo conectar al servidor.";

/// Shown when the server rejects a registration without a message.
pub const MSG_SERVER_REJECTED_DEFAULT: &str = "Error al procesar la solicitud.";

/// Shown when the connection drops while a bidder reply is awaited.
pub const MSG_CONNECTION_LOST: &str = "Error: Se perdió la conexión con el servidor.";

/// Shown when the admin endpoint cannot be reached or answers garbage.
pub const MSG_NETWORK_ERROR: &str = "Error: No se pudo contactar al servidor de administración.";

/// Shown after a successful registration, before the handoff.
pub const MSG_REGISTERED: &str = "Usuario registrado exitosamente.";

/// Submit button label while idle.
pub const LABEL_SUBMIT: &str = "Registrarse";

/// Submit button label while a submission is in flight.
pub const LABEL_SUBMITTING: &str = "Procesando...";
