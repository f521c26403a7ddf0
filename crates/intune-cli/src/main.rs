mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use intune_core::{
    Connection, ConnectionId, ConnectionLifecycle, ConnectionState, NewSong, NewUser, RankLimit,
    Role, Song, SongId, SongUpdate, UserRecord, UserUpdate,
};
use intune_store::Store;
use serde::Serialize;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "intune", about = "InTune music-taste matching and connections")]
struct Cli {
    /// Config file (default: $INTUNE_DATA_DIR/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register, inspect and edit users
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Manage a user's song library
    Song {
        #[command(subcommand)]
        action: SongCommand,
    },

    /// Similarity breakdown between two users
    Score { a: String, b: String },

    /// Rank other users by taste similarity
    Recommend {
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Propose a connection
    Propose {
        from: String,
        to: String,
        /// Song id to recommend to the target
        #[arg(long)]
        track: Option<i64>,
        #[arg(long)]
        message: Option<String>,
    },

    /// Accept, reject or block a pending connection
    Respond {
        connection: i64,
        /// Username of the responding target
        #[arg(long = "as")]
        actor: String,
        state: ConnectionState,
    },

    /// List connections a user sent (or received)
    Connections {
        user: String,
        #[arg(long)]
        received: bool,
        #[arg(long)]
        state: Option<ConnectionState>,
    },

    /// Connection counts for a user
    Stats { user: String },

    /// Accepted connections, most recent first
    Feed {
        user: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    Add {
        username: String,
        #[arg(long)]
        email: String,
        /// Repeatable
        #[arg(long = "genre")]
        genres: Vec<String>,
        /// Repeatable
        #[arg(long = "artist")]
        artists: Vec<String>,
        #[arg(long)]
        instagram: Option<String>,
        #[arg(long)]
        twitter: Option<String>,
        #[arg(long)]
        spotify: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    Show {
        username: String,
    },
    /// Change profile fields; an empty value clears an optional field
    Update {
        username: String,
        #[arg(long = "rename")]
        new_username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        instagram: Option<String>,
        #[arg(long)]
        twitter: Option<String>,
        #[arg(long)]
        spotify: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        picture: Option<String>,
        /// Comma-separated, replaces the list
        #[arg(long, value_delimiter = ',')]
        genres: Option<Vec<String>>,
        /// Comma-separated, replaces the list
        #[arg(long, value_delimiter = ',')]
        artists: Option<Vec<String>>,
    },
    /// Case-insensitive username search
    Search {
        query: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum SongCommand {
    Add {
        user: String,
        title: String,
        artist: String,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        spotify_id: Option<String>,
        #[arg(long)]
        rating: Option<f64>,
        #[arg(long)]
        favorite: bool,
    },
    List {
        user: String,
        #[arg(long)]
        favorites: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Favorites, highest rated first
    Top {
        user: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Update {
        user: String,
        song: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        rating: Option<f64>,
        #[arg(long)]
        favorite: Option<bool>,
    },
    Remove {
        user: String,
        song: i64,
    },
}

struct App {
    store: Store,
    config: AppConfig,
    json: bool,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let config = AppConfig::load(cli.config.as_deref())?;
        let path = config.database_path();
        let store = Store::open(&path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        tracing::debug!("using database {}", path.display());
        Ok(Self {
            store,
            config,
            json: cli.json,
        })
    }

    fn lifecycle(&self) -> ConnectionLifecycle<'_, Store, Store, Store> {
        ConnectionLifecycle::new(&self.store, &self.store, &self.store)
            .with_weights(self.config.weights)
    }

    fn user(&self, username: &str) -> Result<UserRecord> {
        Ok(self.store.require_user(username)?)
    }

    fn username_of(&self, id: intune_core::UserId) -> Result<String> {
        Ok(self
            .store
            .user(id)?
            .map(|u| u.username)
            .unwrap_or_else(|| format!("#{id}")))
    }

    /// JSON when `--json` is set, otherwise the human rendering.
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T) -> Result<()>) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        } else {
            human(value)
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let app = App::open(&cli)?;

    match &cli.command {
        Commands::User { action } => cmd_user(&app, action),
        Commands::Song { action } => cmd_song(&app, action),
        Commands::Score { a, b } => cmd_score(&app, a, b),
        Commands::Recommend { user, limit } => cmd_recommend(&app, user, *limit),
        Commands::Propose {
            from,
            to,
            track,
            message,
        } => cmd_propose(&app, from, to, *track, message.as_deref()),
        Commands::Respond {
            connection,
            actor,
            state,
        } => cmd_respond(&app, *connection, actor, *state),
        Commands::Connections {
            user,
            received,
            state,
        } => cmd_connections(&app, user, *received, *state),
        Commands::Stats { user } => cmd_stats(&app, user),
        Commands::Feed { user, limit } => cmd_feed(&app, user, *limit),
    }
}

// ---------------------------------------------------------------------------
// Users and songs
// ---------------------------------------------------------------------------

fn cmd_user(app: &App, action: &UserCommand) -> Result<()> {
    match action {
        UserCommand::Add {
            username,
            email,
            genres,
            artists,
            instagram,
            twitter,
            spotify,
            bio,
        } => {
            let user = app.store.create_user(&NewUser {
                username: username.clone(),
                email: email.clone(),
                instagram_handle: instagram.clone(),
                twitter_handle: twitter.clone(),
                spotify_handle: spotify.clone(),
                bio: bio.clone(),
                top_genres: genres.clone(),
                favorite_artists: artists.clone(),
            })?;
            app.emit(&user, |u| {
                println!("created user {} ({})", u.username, u.id);
                Ok(())
            })
        }
        UserCommand::Show { username } => {
            let user = app.user(username)?;
            app.emit(&user, |u| {
                print_user(u);
                Ok(())
            })
        }
        UserCommand::Update {
            username,
            new_username,
            email,
            instagram,
            twitter,
            spotify,
            bio,
            picture,
            genres,
            artists,
        } => {
            let update = UserUpdate {
                username: new_username.clone(),
                email: email.clone(),
                instagram_handle: instagram.clone(),
                twitter_handle: twitter.clone(),
                spotify_handle: spotify.clone(),
                bio: bio.clone(),
                profile_picture_url: picture.clone(),
                top_genres: genres.clone(),
                favorite_artists: artists.clone(),
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update");
            }
            let user = app.user(username)?;
            let saved = app.store.save_user(user.id, &update)?;
            app.emit(&saved, |u| {
                println!("updated user {}", u.username);
                Ok(())
            })
        }
        UserCommand::Search { query, limit } => {
            let users = app
                .store
                .search_users(query.as_deref(), None, RankLimit::new(*limit))?;
            app.emit(&users, |users| {
                for u in users {
                    println!("{:>5}  {}", u.id, u.username);
                }
                Ok(())
            })
        }
    }
}

fn print_user(u: &UserRecord) {
    println!("id:          {}", u.id);
    println!("username:    {}", u.username);
    println!("email:       {}", u.email);
    println!("genres:      {}", u.top_genres.join(", "));
    println!("artists:     {}", u.favorite_artists.join(", "));
    for (label, value) in [
        ("instagram:  ", &u.instagram_handle),
        ("twitter:    ", &u.twitter_handle),
        ("spotify:    ", &u.spotify_handle),
        ("bio:        ", &u.bio),
        ("picture:    ", &u.profile_picture_url),
    ] {
        if let Some(v) = value {
            println!("{label} {v}");
        }
    }
    println!("likes:       {}", u.likes_received);
    println!("connections: {}", u.connections_made);
    println!("joined:      {}", u.created_at.to_iso8601());
}

fn cmd_song(app: &App, action: &SongCommand) -> Result<()> {
    match action {
        SongCommand::Add {
            user,
            title,
            artist,
            album,
            genre,
            spotify_id,
            rating,
            favorite,
        } => {
            let owner = app.user(user)?;
            let song = app.store.add_song(
                owner.id,
                &NewSong {
                    title: title.clone(),
                    artist: artist.clone(),
                    album: album.clone(),
                    genre: genre.clone(),
                    spotify_id: spotify_id.clone(),
                    user_rating: *rating,
                    is_favorite: *favorite,
                },
            )?;
            app.emit(&song, |s| {
                println!("added song {}: {} - {}", s.id, s.artist, s.title);
                Ok(())
            })
        }
        SongCommand::List {
            user,
            favorites,
            limit,
        } => {
            let owner = app.user(user)?;
            let songs = app.store.list_songs(owner.id, *favorites, *limit)?;
            app.emit(&songs, |songs| {
                print_songs(songs);
                Ok(())
            })
        }
        SongCommand::Top { user, limit } => {
            let owner = app.user(user)?;
            let songs = app.store.top_songs(owner.id, RankLimit::new(*limit))?;
            app.emit(&songs, |songs| {
                print_songs(songs);
                Ok(())
            })
        }
        SongCommand::Update {
            user,
            song,
            title,
            artist,
            album,
            genre,
            rating,
            favorite,
        } => {
            let update = SongUpdate {
                title: title.clone(),
                artist: artist.clone(),
                album: album.clone(),
                genre: genre.clone(),
                user_rating: *rating,
                is_favorite: *favorite,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update");
            }
            let owner = app.user(user)?;
            let saved = app.store.save_song(SongId(*song), owner.id, &update)?;
            app.emit(&saved, |s| {
                println!("updated song {}", s.id);
                Ok(())
            })
        }
        SongCommand::Remove { user, song } => {
            let owner = app.user(user)?;
            app.store.delete_song(SongId(*song), owner.id)?;
            if !app.json {
                println!("removed song {song}");
            }
            Ok(())
        }
    }
}

fn print_songs(songs: &[Song]) {
    for s in songs {
        let star = if s.is_favorite { "*" } else { " " };
        let rating = s
            .user_rating
            .map(|r| format!(" ({r:.1})"))
            .unwrap_or_default();
        println!("{:>5} {star} {} - {}{rating}", s.id, s.artist, s.title);
    }
}

// ---------------------------------------------------------------------------
// Matching and connections
// ---------------------------------------------------------------------------

fn cmd_score(app: &App, a: &str, b: &str) -> Result<()> {
    let left = app.user(a)?;
    let right = app.user(b)?;
    let overlap = app.lifecycle().compare(left.id, right.id)?;
    app.emit(&overlap, |o| {
        println!("score:   {:.2}", o.score);
        println!(
            "ratios:  genre={:.2} artist={:.2} track={:.2}",
            o.genre_ratio, o.artist_ratio, o.track_ratio
        );
        println!("genres:  {}", o.common_genres.join(", "));
        println!("artists: {}", o.common_artists.join(", "));
        let tracks: Vec<String> = o
            .common_tracks
            .iter()
            .map(|t| format!("{} - {}", t.artist, t.title))
            .collect();
        println!("tracks:  {}", tracks.join(", "));
        Ok(())
    })
}

fn cmd_recommend(app: &App, user: &str, limit: Option<usize>) -> Result<()> {
    let me = app.user(user)?;
    let limit = limit
        .map(RankLimit::new)
        .unwrap_or_else(|| app.config.recommend_limit());
    let recs = app.lifecycle().recommend(me.id, limit)?;
    app.emit(&recs, |recs| {
        if recs.is_empty() {
            println!("(no recommendations)");
        }
        for r in recs {
            println!("{:.2}  {}", r.score, r.username);
            if !r.common_genres.is_empty() {
                println!("      genres:  {}", r.common_genres.join(", "));
            }
            if !r.common_artists.is_empty() {
                println!("      artists: {}", r.common_artists.join(", "));
            }
            for t in &r.top_tracks {
                println!("      track {}: {} - {}", t.id, t.artist, t.title);
            }
        }
        Ok(())
    })
}

fn cmd_propose(
    app: &App,
    from: &str,
    to: &str,
    track: Option<i64>,
    message: Option<&str>,
) -> Result<()> {
    let initiator = app.user(from)?;
    let target = app.user(to)?;
    let created = app
        .lifecycle()
        .propose(initiator.id, target.id, track.map(SongId), message)?;
    app.emit(&created, |c| {
        println!(
            "connection {}: {} -> {} {} (score {:.2})",
            c.id, initiator.username, target.username, c.state, c.score
        );
        Ok(())
    })
}

fn cmd_respond(app: &App, connection: i64, actor: &str, state: ConnectionState) -> Result<()> {
    let actor = app.user(actor)?;
    let updated = app
        .lifecycle()
        .transition(ConnectionId(connection), actor.id, state)?;
    app.emit(&updated, |c| {
        println!("connection {} is now {}", c.id, c.state);
        Ok(())
    })
}

fn cmd_connections(
    app: &App,
    user: &str,
    received: bool,
    state: Option<ConnectionState>,
) -> Result<()> {
    let me = app.user(user)?;
    let role = if received { Role::Target } else { Role::Initiator };
    let list = app.lifecycle().connections(me.id, role, state)?;
    app.emit(&list, |list| {
        for c in list {
            print_connection(app, c, me.id)?;
        }
        Ok(())
    })
}

fn print_connection(app: &App, c: &Connection, me: intune_core::UserId) -> Result<()> {
    let other = c.counterpart(me).unwrap_or(c.target_id);
    let arrow = if c.initiator_id == me { "->" } else { "<-" };
    println!(
        "{:>5}  {arrow} {:<20} {:<9} {:.2}  {}",
        c.id,
        app.username_of(other)?,
        c.state,
        c.score,
        c.created_at.to_iso8601()
    );
    if let Some(msg) = &c.message {
        println!("       \"{msg}\"");
    }
    Ok(())
}

fn cmd_stats(app: &App, user: &str) -> Result<()> {
    let me = app.user(user)?;
    let stats = app.lifecycle().stats(me.id)?;
    app.emit(&stats, |s| {
        println!("accepted:          {}", s.accepted_count);
        println!("pending sent:      {}", s.pending_sent_count);
        println!("pending received:  {}", s.pending_received_count);
        println!("likes received:    {}", s.likes_received);
        println!("connections made:  {}", s.connections_made);
        Ok(())
    })
}

fn cmd_feed(app: &App, user: &str, limit: Option<usize>) -> Result<()> {
    let me = app.user(user)?;
    let limit = limit
        .map(RankLimit::new)
        .unwrap_or_else(|| app.config.feed_limit());
    let feed = app.lifecycle().feed(me.id, limit)?;
    app.emit(&feed, |feed| {
        if feed.is_empty() {
            println!("(no connections yet)");
        }
        for entry in feed {
            println!(
                "{:.2}  {}  since {}",
                entry.score,
                app.username_of(entry.other_user_id)?,
                entry.updated_at.to_iso8601()
            );
        }
        Ok(())
    })
}
