//! # URL Handlers
//!
//! Every page and API endpoint of the blog, and the route table that
//! registers them. Handlers take the shared [`AppContext`] plus their bound
//! arguments; [`routes`] pairs each one with its signature and tag.

use crate::auth::hash_password;
use crate::config::AppConfig;
use crate::database::{Database, DbValue, Query};
use crate::models::{next_id, now, Blog, Comment, Model, User, DEFAULT_IMAGE};
use crate::templates::text2html;
use awesome_core::page::{page_index, Page};
use awesome_core::route::Handler;
use awesome_core::session::{delete_cookie, set_cookie};
use awesome_core::{
    to_json, ApiError, BoundArguments, Principal, Reply, Response, Result, RouteDef, SessionCodec, Signature,
};
use regex::Regex;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tracing::info;

const EMAIL_PATTERN: &str = r"^[a-z0-9.\-_]+@[a-z0-9\-_]+(\.[a-z0-9\-_]+){1,4}$";
const SHA1_PATTERN: &str = r"^[0-9a-f]{40}$";

static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
static SHA1_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Shared state every handler receives
pub struct AppContext {
    /// Record store
    pub db: Database,
    /// Session signer
    pub codec: SessionCodec,
    /// Session cookie name
    pub cookie_name: String,
    /// Session lifetime in seconds
    pub max_age: u64,
}

impl AppContext {
    /// Context built from the loaded configuration
    #[must_use]
    pub fn new(config: &AppConfig, db: Database) -> Self {
        Self {
            db,
            codec: SessionCodec::new(config.session.secret.clone()),
            cookie_name: config.session.cookie_name.clone(),
            max_age: config.session.max_age,
        }
    }
}

/// The route table of the blog
#[must_use]
pub fn routes(ctx: &Arc<AppContext>) -> Vec<RouteDef> {
    let page = || Signature::new().optional("page");
    let by_id = || Signature::new().positional("id").request();
    let blog_fields = |sig: Signature| sig.required("name").required("summary").required("content");

    vec![
        RouteDef::new("index", page(), bind(ctx, index)).get("/"),
        RouteDef::new("get_blog", Signature::new().positional("id"), bind(ctx, get_blog)).get("/blog/{id}"),
        RouteDef::new("register", Signature::new(), bind(ctx, register)).get("/register"),
        RouteDef::new("signin", Signature::new(), bind(ctx, signin)).get("/signin"),
        RouteDef::new(
            "authenticate",
            Signature::new().required("email").required("passwd"),
            bind(ctx, authenticate),
        )
        .post("/api/authenticate"),
        RouteDef::new("signout", Signature::new().request(), bind(ctx, signout)).get("/signout"),
        RouteDef::new("manage", Signature::new(), bind(ctx, manage)).get("/manage/"),
        RouteDef::new("manage_comments", page(), bind(ctx, manage_comments)).get("/manage/comments"),
        RouteDef::new("manage_blogs", page(), bind(ctx, manage_blogs)).get("/manage/blogs"),
        RouteDef::new("manage_users", page(), bind(ctx, manage_users)).get("/manage/users"),
        RouteDef::new("manage_create_blog", Signature::new(), bind(ctx, manage_create_blog))
            .get("/manage/blogs/create"),
        RouteDef::new("manage_edit_blog", Signature::new().required("id"), bind(ctx, manage_edit_blog))
            .get("/manage/blogs/edit"),
        RouteDef::new("api_get_users", page(), bind(ctx, api_get_users)).get("/api/users"),
        RouteDef::new(
            "api_register_user",
            Signature::new().required("email").required("name").required("passwd"),
            bind(ctx, api_register_user),
        )
        .post("/api/users"),
        RouteDef::new("api_blogs", page(), bind(ctx, api_blogs)).get("/api/blogs"),
        RouteDef::new(
            "api_create_blog",
            blog_fields(Signature::new().request()),
            bind(ctx, api_create_blog),
        )
        .post("/api/blogs"),
        RouteDef::new("api_get_blog", Signature::new().positional("id"), bind(ctx, api_get_blog))
            .get("/api/blogs/{id}"),
        RouteDef::new("api_update_blog", blog_fields(by_id()), bind(ctx, api_update_blog))
            .post("/api/blogs/{id}"),
        RouteDef::new("api_delete_blog", by_id(), bind(ctx, api_delete_blog)).post("/api/blogs/{id}/delete"),
        RouteDef::new(
            "api_create_comment",
            by_id().required("content"),
            bind(ctx, api_create_comment),
        )
        .get("/api/blogs/{id}/comments"),
        RouteDef::new(
            "api_create_comment",
            by_id().required("content"),
            bind(ctx, api_create_comment),
        )
        .post("/api/blogs/{id}/comments"),
        RouteDef::new("api_comments", page(), bind(ctx, api_comments)).get("/api/comments"),
        RouteDef::new("api_delete_comment", by_id(), bind(ctx, api_delete_comment))
            .post("/api/comments/{id}/delete"),
    ]
}

/// Close a context-taking handler over `ctx`
fn bind<F, Fut>(ctx: &Arc<AppContext>, f: F) -> impl Handler
where
    F: Fn(Arc<AppContext>, BoundArguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    move |args: BoundArguments| f(Arc::clone(&ctx), args)
}

// ---------------------------------------------------------------------------
// pages

async fn index(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let (page, blogs) = paged::<Blog>(&ctx.db, requested_page(&args)).await?;
    Ok(Reply::template("blogs.html", json!({"page": page, "blogs": blogs})))
}

async fn get_blog(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let id = args.required_text("id")?;
    let blog: Blog = ctx
        .db
        .find(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog", "Blog not found."))?;
    let comments: Vec<Comment> = ctx
        .db
        .find_all(
            &Query::new()
                .filter("blog_id = ?", vec![DbValue::from(id)])
                .order_by("created_at desc"),
        )
        .await?;

    let comments = comments
        .iter()
        .map(|c| with_html(c, &c.content))
        .collect::<Result<Vec<_>>>()?;
    Ok(Reply::template(
        "blog.html",
        json!({"blog": with_html(&blog, &blog.content)?, "comments": comments}),
    ))
}

async fn register(_ctx: Arc<AppContext>, _args: BoundArguments) -> Result<Reply> {
    Ok(Reply::template("register.html", Value::Null))
}

async fn signin(_ctx: Arc<AppContext>, _args: BoundArguments) -> Result<Reply> {
    Ok(Reply::template("signin.html", Value::Null))
}

async fn signout(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let referer = args
        .request()
        .and_then(|r| r.header("referer"))
        .filter(|r| !r.is_empty())
        .unwrap_or("/");
    info!("user signed out");
    Ok(Response::redirect(referer)
        .with_header("Set-Cookie", &delete_cookie(&ctx.cookie_name))
        .into())
}

async fn manage(_ctx: Arc<AppContext>, _args: BoundArguments) -> Result<Reply> {
    Ok(Reply::from("redirect:/manage/comments"))
}

async fn manage_comments(_ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    Ok(manage_page("manage_comments.html", &args))
}

async fn manage_blogs(_ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    Ok(manage_page("manage_blogs.html", &args))
}

async fn manage_users(_ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    Ok(manage_page("manage_users.html", &args))
}

async fn manage_create_blog(_ctx: Arc<AppContext>, _args: BoundArguments) -> Result<Reply> {
    Ok(Reply::template(
        "manage_blog_edit.html",
        json!({"id": "", "action": "/api/blogs"}),
    ))
}

async fn manage_edit_blog(_ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let id = args.required_text("id")?;
    Ok(Reply::template(
        "manage_blog_edit.html",
        json!({"action": format!("/api/blogs/{id}"), "id": id}),
    ))
}

// ---------------------------------------------------------------------------
// users

async fn api_get_users(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let (page, users) = paged::<User>(&ctx.db, requested_page(&args)).await?;
    let users: Vec<User> = users.iter().map(User::masked).collect();
    Ok(Reply::Json(json!({"page": page, "users": users})))
}

async fn authenticate(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let email = args.text("email").unwrap_or_default();
    let passwd = args.text("passwd").unwrap_or_default();
    if email.trim().is_empty() {
        return Err(ApiError::value_invalid("email", "Invalid email.").into());
    }
    if passwd.is_empty() {
        return Err(ApiError::value_invalid("passwd", "Invalid password.").into());
    }

    let users: Vec<User> = ctx
        .db
        .find_all(&Query::new().filter("email = ?", vec![DbValue::from(email.trim())]))
        .await?;
    let Some(user) = users.into_iter().next() else {
        return Err(ApiError::value_invalid("email", "Email not exist.").into());
    };
    if hash_password(&user.id, &passwd) != user.passwd {
        return Err(ApiError::value_invalid("passwd", "Invalid password.").into());
    }

    info!(user = %user.email, "signed in");
    signed_in(&ctx, &user)
}

async fn api_register_user(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let name = args.text("name").unwrap_or_default();
    let email = args.text("email").unwrap_or_default();
    let passwd = args.text("passwd").unwrap_or_default();
    if name.trim().is_empty() {
        return Err(ApiError::value_invalid("name", "Name cannot be empty.").into());
    }
    if !is_email(&email) {
        return Err(ApiError::value_invalid("email", "Invalid email.").into());
    }
    if !is_sha1(&passwd) {
        return Err(ApiError::value_invalid("passwd", "Invalid password.").into());
    }

    let existing = ctx
        .db
        .find_number::<User>("count(id)", Some("email = ?"), &[DbValue::from(email.as_str())])
        .await?;
    if existing > 0 {
        return Err(ApiError::new("register:failed", "email", "Email is already in use.").into());
    }

    let id = next_id();
    let user = User {
        passwd: hash_password(&id, &passwd),
        id,
        email,
        admin: false,
        name: name.trim().to_string(),
        image: DEFAULT_IMAGE.to_string(),
        created_at: now(),
    };
    ctx.db.save(&user).await?;

    info!(user = %user.email, "registered");
    signed_in(&ctx, &user)
}

// ---------------------------------------------------------------------------
// blogs

async fn api_blogs(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let (page, blogs) = paged::<Blog>(&ctx.db, requested_page(&args)).await?;
    Ok(Reply::Json(json!({"page": page, "blogs": blogs})))
}

async fn api_get_blog(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let id = args.required_text("id")?;
    let blog: Blog = ctx
        .db
        .find(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog", "Blog not found."))?;
    Reply::json(&blog)
}

async fn api_create_blog(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let author = check_admin(&args)?.clone();
    let name = non_empty(&args, "name", "name cannot be empty.")?;
    let summary = non_empty(&args, "summary", "summary cannot be empty.")?;
    let content = non_empty(&args, "content", "content cannot be empty.")?;

    let blog = Blog {
        id: next_id(),
        user_id: author.id,
        user_name: author.name,
        user_image: author.image,
        name,
        summary,
        content,
        created_at: now(),
    };
    ctx.db.save(&blog).await?;
    Reply::json(&blog)
}

async fn api_update_blog(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    check_admin(&args)?;
    let id = args.required_text("id")?;
    let mut blog: Blog = ctx
        .db
        .find(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog", "Blog not found."))?;

    blog.name = non_empty(&args, "name", "name cannot be empty.")?;
    blog.summary = non_empty(&args, "summary", "summary cannot be empty.")?;
    blog.content = non_empty(&args, "content", "content cannot be empty.")?;
    ctx.db.update(&blog).await?;
    Reply::json(&blog)
}

async fn api_delete_blog(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    check_admin(&args)?;
    let id = args.required_text("id")?;
    let blog: Blog = ctx
        .db
        .find(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog", "Blog not found."))?;
    ctx.db.remove(&blog).await?;
    Ok(Reply::Json(json!({"id": id})))
}

// ---------------------------------------------------------------------------
// comments

async fn api_comments(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let (page, comments) = paged::<Comment>(&ctx.db, requested_page(&args)).await?;
    Ok(Reply::Json(json!({"page": page, "comments": comments})))
}

async fn api_create_comment(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    let Some(user) = args.principal().cloned() else {
        return Err(ApiError::permission("Please signin first.").into());
    };
    let content = non_empty(&args, "content", "content cannot be empty.")?;
    let id = args.required_text("id")?;
    let blog: Blog = ctx
        .db
        .find(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog", "Blog not found."))?;

    let comment = Comment {
        id: next_id(),
        blog_id: blog.id,
        user_id: user.id,
        user_name: user.name,
        user_image: user.image,
        content,
        created_at: now(),
    };
    ctx.db.save(&comment).await?;
    Reply::json(&comment)
}

async fn api_delete_comment(ctx: Arc<AppContext>, args: BoundArguments) -> Result<Reply> {
    check_admin(&args)?;
    let id = args.required_text("id")?;
    let comment: Comment = ctx
        .db
        .find(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment", "Comment not found."))?;
    ctx.db.remove(&comment).await?;
    Ok(Reply::Json(json!({"id": id})))
}

// ---------------------------------------------------------------------------
// helpers

fn requested_page(args: &BoundArguments) -> u64 {
    page_index(args.text("page").as_deref())
}

/// One page of `M`, newest first
async fn paged<M: Model>(db: &Database, index: u64) -> Result<(Page, Vec<M>)> {
    let count = db.find_number::<M>("count(id)", None, &[]).await?;
    let page = Page::with_default_size(count, index);
    if page.limit == 0 {
        return Ok((page, Vec::new()));
    }
    let items = db
        .find_all(&Query::new().order_by("created_at desc").limit(page.offset, page.limit))
        .await?;
    Ok((page, items))
}

fn manage_page(template: &str, args: &BoundArguments) -> Reply {
    Reply::template(template, json!({"page_index": requested_page(args)}))
}

/// The signed-in principal, if it is an administrator
fn check_admin(args: &BoundArguments) -> Result<&Principal> {
    args.principal()
        .filter(|p| p.admin)
        .ok_or_else(|| ApiError::permission("").into())
}

/// Trimmed value of `field`, which must not be blank
fn non_empty(args: &BoundArguments, field: &str, message: &str) -> Result<String> {
    let value = args.text(field).unwrap_or_default();
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::value_invalid(field, message).into());
    }
    Ok(value.to_string())
}

/// JSON user plus session cookie
fn signed_in(ctx: &AppContext, user: &User) -> Result<Reply> {
    let token = ctx.codec.encode(&user.id, &user.passwd, ctx.max_age);
    let cookie = set_cookie(&ctx.cookie_name, &token, ctx.max_age);
    Ok(Response::json(to_json(&user.masked())?)
        .with_header("Set-Cookie", &cookie)
        .into())
}

/// Serialized record with its `content` rendered as `html_content`
fn with_html<T: serde::Serialize>(record: &T, content: &str) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        map.insert("html_content".to_string(), Value::String(text2html(content)));
    }
    Ok(value)
}

fn is_email(email: &str) -> bool {
    EMAIL_RE
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

fn is_sha1(passwd: &str) -> bool {
    SHA1_RE
        .get_or_init(|| Regex::new(SHA1_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(passwd))
}
