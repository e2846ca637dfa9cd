/// Router Module Index
///
/// One router per resource, each nested under its own prefix by
/// `create_router`. Access control is not applied here: every handler runs its
/// own authorization pipeline, so the stage list sits next to the code it
/// protects.

/// `/user/*`: student accounts and plain login.
pub mod user;

/// `/admin/*`: admin profiles; writes need an active admin plus password.
pub mod admin;

/// `/company/*`: self-registration, profile updates, company login.
pub mod company;

/// `/job-post/*`: postings owned by the acting company.
pub mod job_post;

/// `/token/*`: session refresh.
pub mod token;
